//! UTC clock and timestamp arithmetic. Node timestamps travel as RFC3339
//! strings; everything internal compares unix seconds.

use chrono::{DateTime, Utc};

pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Parses an RFC3339 timestamp to unix seconds. `None` on malformed input.
pub fn parse_rfc3339(ts: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(ts).ok().map(|t| t.timestamp())
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}
