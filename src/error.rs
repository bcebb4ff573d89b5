use serde_json::Value;
use thiserror::Error;

/// Main error type for query operations
#[derive(Debug, Error)]
pub enum QueryError {
    /// Requested output format is not registered
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Server answered with a non-success status
    #[error("server error {status} {status_text}: {message}")]
    Server {
        status: u16,
        status_text: String,
        message: String,
        details: Option<String>,
    },

    /// Key derivation or MAC computation failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// Network or connection level failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest transport
    #[error("transport error: {0}")]
    TransportMessage(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Result cannot be viewed in the requested shape
    #[error("decode error: {0}")]
    Decode(String),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Missing or unusable client configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Error document returned by the server on non-2xx responses.
/// Fields are read one by one so a mistyped field does not hide the others.
#[derive(Debug, Default)]
struct ServerErrorBody {
    status_text: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

impl ServerErrorBody {
    fn parse(body: &[u8]) -> Self {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(_) => return Self::default(),
        };

        let text = |key: &str| match value.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        ServerErrorBody {
            status_text: value.get("statusText").and_then(Value::as_str).map(str::to_string),
            error: text("error"),
            details: text("details"),
        }
    }
}

impl QueryError {
    /// Build a server error from the HTTP status line and the raw response body.
    ///
    /// The status code and reason phrase come from the transport; the message
    /// and details come from the JSON body. A body that is not JSON, or has no
    /// `error` field, falls back to its raw text and then to the status text.
    pub fn from_response(status: u16, status_text: &str, body: &[u8]) -> Self {
        let parsed = ServerErrorBody::parse(body);

        let status_text = if status_text.is_empty() {
            parsed.status_text.unwrap_or_default()
        } else {
            status_text.to_string()
        };

        let message = match parsed.error {
            Some(message) if !message.is_empty() => message,
            _ => {
                let raw = String::from_utf8_lossy(body).trim().to_string();
                if raw.is_empty() {
                    status_text.clone()
                } else {
                    raw
                }
            }
        };

        QueryError::Server {
            status,
            status_text,
            message,
            details: parsed.details,
        }
    }

    /// Get the HTTP status code if this is a server error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            QueryError::Server { status, .. } => Some(*status),
            QueryError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Get the server's error message if this is a server error
    pub fn server_message(&self) -> Option<&str> {
        match self {
            QueryError::Server { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Check if the server rejected the request credentials (401)
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, QueryError::Server { status: 401, .. })
    }

    /// Check if the call failed on format resolution, before any I/O
    pub fn is_invalid_format(&self) -> bool {
        matches!(self, QueryError::InvalidFormat(_))
    }
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
