use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

use crate::error::{QueryError, Result};

/// Connection used when a query does not name one
pub const DEFAULT_CONNECTION: &str = "default";

/// Header carrying the request timestamp that was signed
pub const REQUEST_TIME_HEADER: &str = "X-Request-Time";

/// Create the default HTTP client for query requests
/// with connection pooling and a connect timeout.
///
/// No overall request timeout is set; long-running queries are bounded by
/// the caller.
pub fn create_http_client() -> Result<Client> {
    Ok(ClientBuilder::new()
        .pool_max_idle_per_host(50)
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

/// Configuration for a query client: server location and credentials
#[derive(Clone)]
pub struct Config {
    /// Base URL of the server, e.g. `http://localhost:8080/`
    pub url: String,
    /// Client identifier embedded in every token
    pub client_id: String,
    /// Shared secret used to sign requests
    pub client_secret: Vec<u8>,
    /// Connection used when a query does not name one
    pub connection: String,
}

impl Config {
    /// Create a new configuration using the default connection
    pub fn new(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<Vec<u8>>,
    ) -> Self {
        Config {
            url: url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            connection: DEFAULT_CONNECTION.to_string(),
        }
    }

    /// Set the default connection
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    /// Load configuration from `PGREST_URL`, `PGREST_CLIENT_ID`,
    /// `PGREST_CLIENT_SECRET` and optionally `PGREST_CONNECTION`.
    pub fn from_env() -> Result<Self> {
        fn var(name: &str) -> Result<String> {
            std::env::var(name).map_err(|_| QueryError::Config(format!("{} is not set", name)))
        }

        let config = Config::new(
            var("PGREST_URL")?,
            var("PGREST_CLIENT_ID")?,
            var("PGREST_CLIENT_SECRET")?,
        );

        Ok(match std::env::var("PGREST_CONNECTION") {
            Ok(connection) if !connection.is_empty() => config.with_connection(connection),
            _ => config,
        })
    }

    /// Check that the configuration can produce requests
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.url)?;
        if url.cannot_be_a_base() {
            return Err(QueryError::Config(format!(
                "server URL cannot be used as a base: {}",
                self.url
            )));
        }
        if self.client_id.is_empty() {
            return Err(QueryError::Config("client id is empty".to_string()));
        }
        if self.connection.is_empty() {
            return Err(QueryError::Config("default connection is empty".to_string()));
        }
        Ok(())
    }

    /// Query endpoint for a connection: `{url}/api/{connection}/query`,
    /// with exactly one `/` between the base URL and `api`.
    pub fn query_endpoint(&self, connection: &str) -> String {
        format!("{}/api/{}/query", self.url.trim_end_matches('/'), connection)
    }
}

// Implement Debug manually to avoid exposing the secret
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("connection", &self.connection)
            .finish()
    }
}

/// A fully built, signed query request ready to be sent
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub url: String,
    pub content_type: &'static str,
    pub accept_encoding: String,
    /// Decimal unix seconds, identical to the value that was signed
    pub request_time: String,
    /// Full `Authorization` header value
    pub authorization: String,
    pub body: Bytes,
}

/// Future resolving to a response body that has not been read yet
pub type BodyFuture = Pin<Box<dyn Future<Output = Result<Bytes>> + Send>>;

/// Response body as handed back by a transport, possibly still unread
pub enum ResponseBody {
    /// Body already in memory
    Buffered(Bytes),
    /// Headers received, body still on the wire
    Pending(reqwest::Response),
    /// Body produced by a custom transport on demand
    Deferred(BodyFuture),
}

impl ResponseBody {
    /// Read the whole body, decompressed according to `Content-Encoding`
    pub async fn bytes(self) -> Result<Bytes> {
        match self {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Pending(response) => Ok(response.bytes().await?),
            ResponseBody::Deferred(future) => future.await,
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        ResponseBody::Buffered(bytes)
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            ResponseBody::Pending(_) => f.write_str("Pending"),
            ResponseBody::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// HTTP response handed back by a transport once the status line and
/// headers have arrived
#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport performs one HTTP POST round trip.
///
/// `post` should resolve as soon as the response headers arrive and leave
/// the body unread; the query's execution time stops at that point.
/// Implementations must not retry; any failure is reported once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: SignedRequest) -> Result<TransportResponse>;
}

/// Transport backed by a pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Ok(HttpTransport {
            client: create_http_client()?,
        })
    }

    /// Use an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        HttpTransport { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: SignedRequest) -> Result<TransportResponse> {
        let response = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, request.content_type)
            .header(ACCEPT_ENCODING, request.accept_encoding)
            .header(REQUEST_TIME_HEADER, request.request_time)
            .header(AUTHORIZATION, request.authorization)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body: ResponseBody::Pending(response),
        })
    }
}
