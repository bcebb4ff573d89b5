use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

use crate::client::{Config, HttpTransport, SignedRequest, Transport, TransportResponse};
use crate::error::{QueryError, Result};
use crate::format::Format;
use crate::key::KeyMaterial;
use crate::response::QueryResult;
use crate::time::{duration_ms, format_execution_time, ExecutionTimeFormatter, RequestTime};
use crate::token::build_token;

/// Accept-Encoding sent when a query does not set one
pub const DEFAULT_ENCODING: &str = "gzip, br";

/// Per-call query options
#[derive(Clone, Default)]
pub struct QueryOptions {
    /// Connection to query; defaults to the client's connection
    pub connection: Option<String>,
    /// Output format name; defaults to `json`
    pub format: Option<String>,
    /// Accept-Encoding header; defaults to `gzip, br`
    pub encoding: Option<String>,
    /// Execution time formatter; defaults to the client's formatter
    pub execution_time_formatter: Option<ExecutionTimeFormatter>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    /// Set the output format by name or by `Format` value.
    /// Names are checked when the query runs.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn execution_time_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(f64) -> String + Send + Sync + 'static,
    {
        self.execution_time_formatter = Some(Arc::new(formatter));
        self
    }
}

impl std::fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("connection", &self.connection)
            .field("format", &self.format)
            .field("encoding", &self.encoding)
            .field(
                "execution_time_formatter",
                &self.execution_time_formatter.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}

/// Request body; field order is fixed so the signed bytes are reproducible
#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    format: Format,
}

/// Serialize the request body exactly as it is signed and sent
pub fn serialize_body(query: &str, format: Format) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(&QueryBody { query, format })?))
}

/// QueryClient runs signed queries against a server.
///
/// Cloning is cheap; clones share the transport and the memoized signing key.
#[derive(Clone)]
pub struct QueryClient {
    config: Arc<Config>,
    key: Arc<KeyMaterial>,
    transport: Arc<dyn Transport>,
    execution_time_formatter: Option<ExecutionTimeFormatter>,
}

impl QueryClient {
    /// Create a new client using an HTTP transport
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new()?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a new client from `PGREST_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    /// Create a new client sending requests through a custom transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        Ok(QueryClient {
            key: Arc::new(KeyMaterial::new(config.client_secret.clone())),
            config: Arc::new(config),
            transport,
            execution_time_formatter: None,
        })
    }

    /// Set the formatter used when a query does not supply one
    pub fn with_execution_time_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(f64) -> String + Send + Sync + 'static,
    {
        self.execution_time_formatter = Some(Arc::new(formatter));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a query with default options: JSON output on the client's connection
    pub async fn query_default(&self, query: &str) -> Result<QueryResult> {
        self.query(query, QueryOptions::default()).await
    }

    /// Run a query and deserialize the JSON result into the target type
    pub async fn query_as<T>(&self, query: &str, options: QueryOptions) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.query(query, options).await?.apply()
    }

    /// Run a query and decode the response according to the requested format.
    ///
    /// Fails with `InvalidFormat` before any I/O if the format name is unknown.
    /// A non-2xx response fails with `QueryError::Server` without attempting
    /// format decoding.
    pub async fn query(&self, query: &str, options: QueryOptions) -> Result<QueryResult> {
        let format: Format = match options.format.as_deref() {
            Some(name) => name.parse()?,
            None => Format::default(),
        };

        let body = serialize_body(query, format)?;

        let time = RequestTime::now();
        let token = build_token(&self.key, &self.config.client_id, &body, time)?;

        let connection = options
            .connection
            .as_deref()
            .unwrap_or(&self.config.connection);

        let request = SignedRequest {
            url: self.config.query_endpoint(connection),
            content_type: format.content_type(),
            accept_encoding: options
                .encoding
                .unwrap_or_else(|| DEFAULT_ENCODING.to_string()),
            request_time: time.to_string(),
            authorization: token.bearer(),
            body,
        };

        let start = Instant::now();
        let response = self.transport.post(request).await;
        let elapsed = start.elapsed();
        let response = response?;

        tracing::debug!(
            connection,
            format = %format,
            status = response.status,
            elapsed = ?elapsed,
            "query completed"
        );

        let success = response.is_success();
        let TransportResponse {
            status,
            status_text,
            body,
        } = response;
        let body = body.bytes().await?;

        if !success {
            return Err(QueryError::from_response(status, &status_text, &body));
        }

        let duration = duration_ms(elapsed);
        let execution_time = match options
            .execution_time_formatter
            .as_ref()
            .or(self.execution_time_formatter.as_ref())
        {
            Some(formatter) => formatter(duration),
            None => format_execution_time(duration),
        };

        QueryResult::decode(format.decoder(), body, execution_time)
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("config", &self.config)
            .field("key", &self.key)
            .finish()
    }
}
