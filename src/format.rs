use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Output format requested from the server
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Format {
    /// JSON document
    #[default]
    Json,
    /// JSON with rows as arrays; decoded exactly like `Json`
    JsonDataArray,
    /// CSV text
    Csv,
    /// Arrow IPC stream bytes
    Arrow,
    /// Parquet file bytes
    Parquet,
}

/// How a successful response body is turned into a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// Parse as JSON and attach the execution time
    Json,
    /// Return the body as text
    Text,
    /// Return the body bytes untouched
    Binary,
}

impl Format {
    /// Every registered format
    pub const ALL: [Format; 5] = [
        Format::Json,
        Format::JsonDataArray,
        Format::Csv,
        Format::Arrow,
        Format::Parquet,
    ];

    /// Name used in the request body and accepted by `from_str`
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::JsonDataArray => "jsonDataArray",
            Format::Csv => "csv",
            Format::Arrow => "arrow",
            Format::Parquet => "parquet",
        }
    }

    /// Content-Type header sent with the request
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Json | Format::JsonDataArray => "application/json",
            Format::Csv => "text/csv",
            Format::Arrow => "application/vnd.apache.arrow.stream",
            Format::Parquet => "application/octet-stream",
        }
    }

    pub fn decoder(&self) -> Decoder {
        match self {
            Format::Json | Format::JsonDataArray => Decoder::Json,
            Format::Csv => Decoder::Text,
            Format::Arrow | Format::Parquet => Decoder::Binary,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = QueryError;

    /// Exact, case-sensitive name match
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.as_str() == name)
            .ok_or_else(|| QueryError::InvalidFormat(name.to_string()))
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.as_str().to_string()
    }
}
