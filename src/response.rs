use bytes::Bytes;
use serde_json::Value;

use crate::error::{QueryError, Result};
use crate::format::Decoder;

/// Field attached to JSON results carrying the formatted round-trip time
pub const EXECUTION_TIME_FIELD: &str = "executionTime";

/// QueryResult is a decoded query response.
/// The variant follows the requested format's decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// JSON document (json and jsonDataArray), with `executionTime` attached
    Json(Value),
    /// CSV text, returned as-is
    Text(String),
    /// Arrow or Parquet payload, returned as-is
    Binary(Bytes),
}

impl QueryResult {
    /// Decode a successful response body.
    ///
    /// JSON objects get the `executionTime` field set to `execution_time`.
    /// Text and binary bodies are returned untouched.
    pub fn decode(decoder: Decoder, body: Bytes, execution_time: String) -> Result<Self> {
        match decoder {
            Decoder::Json => {
                let mut value: Value = serde_json::from_slice(&body)?;
                if let Value::Object(ref mut map) = value {
                    map.insert(EXECUTION_TIME_FIELD.to_string(), Value::String(execution_time));
                }
                Ok(QueryResult::Json(value))
            }
            Decoder::Text => Ok(QueryResult::Text(String::from_utf8_lossy(&body).into_owned())),
            Decoder::Binary => Ok(QueryResult::Binary(body)),
        }
    }

    /// Get the JSON document, if this is a JSON result
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            QueryResult::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Get the text body, if this is a CSV result
    pub fn as_text(&self) -> Option<&str> {
        match self {
            QueryResult::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the raw payload, if this is a binary result
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            QueryResult::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            QueryResult::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            QueryResult::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            QueryResult::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Formatted execution time attached to a JSON result
    pub fn execution_time(&self) -> Option<&str> {
        self.as_json()?.get(EXECUTION_TIME_FIELD)?.as_str()
    }

    /// Get a value from a JSON result by a slash-separated path.
    /// For example, "data/0/name" reads the "name" field of the first row.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = self.as_json()?;

        for part in path.split('/').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    arr.get(index)?
                }
                _ => return None,
            };
        }

        Some(current)
    }

    /// Get a string value from a JSON result by a slash-separated path
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    /// Deserialize a JSON result into the target type
    pub fn apply<T>(&self) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        match self {
            QueryResult::Json(value) => serde_json::from_value(value.clone()).map_err(|e| e.into()),
            QueryResult::Text(_) => Err(QueryError::Decode("result is CSV text, not JSON".to_string())),
            QueryResult::Binary(_) => Err(QueryError::Decode("result is binary, not JSON".to_string())),
        }
    }
}
