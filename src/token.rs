use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt;

use crate::error::Result;
use crate::key::KeyMaterial;
use crate::time::RequestTime;

/// AuthToken is the per-request bearer credential.
///
/// It embeds the request timestamp, so it is only valid for the call it was
/// built for and is never cached.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Token string as sent after `Bearer `
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthToken").field(&"<redacted>").finish()
    }
}

/// Build the signed payload: the body bytes followed by the decimal timestamp.
/// An empty body signs the timestamp alone.
pub fn signing_payload(body: &[u8], time: RequestTime) -> Vec<u8> {
    let time = time.to_string();
    let mut payload = Vec::with_capacity(body.len() + time.len());
    payload.extend_from_slice(body);
    payload.extend_from_slice(time.as_bytes());
    payload
}

/// Build the bearer token for one request.
///
/// `base64(client_id + "." + base64(hmac_sha256(secret, body + time)))`
pub fn build_token(
    key: &KeyMaterial,
    client_id: &str,
    body: &[u8],
    time: RequestTime,
) -> Result<AuthToken> {
    let mac = key.sign(&signing_payload(body, time))?;
    let hmac = STANDARD.encode(mac);

    Ok(AuthToken(STANDARD.encode(format!("{}.{}", client_id, hmac))))
}
