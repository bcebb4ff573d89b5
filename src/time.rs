use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Formats a round-trip duration, given in milliseconds, for display
pub type ExecutionTimeFormatter = Arc<dyn Fn(f64) -> String + Send + Sync>;

/// Unix timestamp in whole seconds, captured once per request.
///
/// The same value is folded into the signed payload and sent as the
/// `X-Request-Time` header, so both must come from one `RequestTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTime(i64);

impl RequestTime {
    /// Capture the current wall-clock time
    pub fn now() -> Self {
        RequestTime(Utc::now().timestamp())
    }

    /// Create a RequestTime from a unix timestamp in seconds
    pub fn from_unix(unix: i64) -> Self {
        RequestTime(unix)
    }

    /// Get the unix timestamp in seconds
    pub fn unix(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RequestTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RequestTime {
    fn from(unix: i64) -> Self {
        RequestTime(unix)
    }
}

/// Default execution time rendering: `"450 ms"` below one second, `"2.53 s"` above.
pub fn format_execution_time(duration_ms: f64) -> String {
    if duration_ms < 1000.0 {
        format!("{} ms", duration_ms.round())
    } else {
        format!("{:.2} s", duration_ms / 1000.0)
    }
}

/// Convert a measured duration to fractional milliseconds
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
