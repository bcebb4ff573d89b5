//! # pgrest-client - authenticated query client for PGRest servers
//!
//! Sends SQL queries to a PGRest server and decodes the response in the
//! requested output format. Every request is signed with the client's shared
//! secret, so the secret itself never travels over the wire.
//!
//! ## Features
//!
//! - HMAC-SHA-256 request signing with a per-request timestamp
//! - Signing key derived once per client and shared across concurrent queries
//! - Output formats: `json`, `jsonDataArray`, `csv`, `arrow`, `parquet`
//! - Structured server errors carrying status, message and details
//! - Execution time attached to JSON results, with a pluggable formatter
//!
//! ## Basic Usage
//!
//! ```no_run
//! use pgrest_client::{Config, QueryClient};
//!
//! # async fn run() -> Result<(), pgrest_client::QueryError> {
//! let config = Config::new(
//!     "http://localhost:8080/",
//!     "pgrest",
//!     "98265691-8b9e-44dc-acf9-94610c392c00",
//! );
//! let client = QueryClient::new(config)?;
//!
//! let result = client.query_default("SELECT id, name FROM users LIMIT 10").await?;
//! println!("{:?}", result.get("data"));
//! println!("Execution time: {}", result.execution_time().unwrap_or("-"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Other Formats
//!
//! ```no_run
//! use pgrest_client::{Format, QueryClient, QueryOptions};
//!
//! # async fn run(client: QueryClient) -> Result<(), pgrest_client::QueryError> {
//! let csv = client
//!     .query("SELECT * FROM weather", QueryOptions::new().format(Format::Csv))
//!     .await?;
//! print!("{}", csv.as_text().unwrap_or_default());
//!
//! let arrow = client
//!     .query("SELECT * FROM weather", QueryOptions::new().format("arrow"))
//!     .await?;
//! println!("{} bytes of Arrow IPC", arrow.as_bytes().map(|b| b.len()).unwrap_or(0));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod format;
pub mod key;
pub mod query;
pub mod response;
pub mod time;
pub mod token;

// Re-export main types for convenience
pub use client::{
    Config, HttpTransport, ResponseBody, SignedRequest, Transport, TransportResponse,
};
pub use error::{QueryError, Result};
pub use format::{Decoder, Format};
pub use key::KeyMaterial;
pub use query::{QueryClient, QueryOptions};
pub use response::QueryResult;
pub use time::{format_execution_time, ExecutionTimeFormatter, RequestTime};
pub use token::{build_token, AuthToken};
