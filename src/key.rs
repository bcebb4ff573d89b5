use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::OnceLock;

#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{QueryError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of an HMAC-SHA-256 tag
pub const MAC_LEN: usize = 32;

/// SigningKey is an HMAC-SHA-256 key with the secret already absorbed.
///
/// Cloning is cheap and does not touch the original secret.
#[derive(Clone)]
pub struct SigningKey {
    mac: HmacSha256,
}

impl SigningKey {
    /// Derive a signing key from raw secret bytes
    pub fn derive(secret: &[u8]) -> std::result::Result<Self, InvalidLength> {
        Ok(SigningKey {
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    /// Compute HMAC-SHA-256 over the message
    pub fn sign(&self, message: &[u8]) -> [u8; MAC_LEN] {
        let mut mac = self.mac.clone();
        mac.update(message);

        let mut tag = [0u8; MAC_LEN];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        tag
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").field("mac", &"<redacted>").finish()
    }
}

/// KeyMaterial holds the shared client secret and the signing key derived from it.
///
/// The key is derived on first use and cached for the life of the value.
/// A failed derivation is cached as well: every later call reports the same
/// failure until a new `KeyMaterial` is built.
pub struct KeyMaterial {
    secret: Vec<u8>,
    key: OnceLock<std::result::Result<SigningKey, InvalidLength>>,
    #[cfg(test)]
    derivations: AtomicUsize,
}

impl KeyMaterial {
    /// Create key material from the shared secret bytes
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        KeyMaterial {
            secret: secret.into(),
            key: OnceLock::new(),
            #[cfg(test)]
            derivations: AtomicUsize::new(0),
        }
    }

    /// Get the memoized signing key, deriving it on first call
    pub fn signing_key(&self) -> Result<&SigningKey> {
        self.key
            .get_or_init(|| {
                #[cfg(test)]
                self.derivations.fetch_add(1, Ordering::SeqCst);
                tracing::trace!("deriving HMAC-SHA-256 signing key");
                SigningKey::derive(&self.secret)
            })
            .as_ref()
            .map_err(|e| QueryError::Signing(format!("invalid key material: {}", e)))
    }

    /// Sign a message with the memoized key
    pub fn sign(&self, message: &[u8]) -> Result<[u8; MAC_LEN]> {
        Ok(self.signing_key()?.sign(message))
    }

    /// Whether the key has already been derived (successfully or not)
    pub fn is_derived(&self) -> bool {
        self.key.get().is_some()
    }

    #[cfg(test)]
    pub(crate) fn derivation_count(&self) -> usize {
        self.derivations.load(Ordering::SeqCst)
    }
}

// Implement Debug manually to avoid exposing the secret
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("secret", &"<redacted>")
            .field("derived", &self.is_derived())
            .finish()
    }
}
