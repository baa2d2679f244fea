//! Fetch timestamps and storage object keys.

use chrono::{DateTime, Utc};

/// Format of `fetch_ts`: UTC, second precision, `Z` suffix.
pub const FETCH_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The time-partition metadata shared by every feed of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchStamp {
    pub fetch_ts: String,
    pub date: String,
}

impl FetchStamp {
    pub fn at(now: DateTime<Utc>) -> Self {
        let fetch_ts = now.format(FETCH_TS_FORMAT).to_string();
        let date = date_partition(&fetch_ts).to_string();
        Self { fetch_ts, date }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

/// The `YYYY-MM-DD` part of a fetch timestamp.
pub fn date_partition(fetch_ts: &str) -> &str {
    fetch_ts.get(..10).unwrap_or(fetch_ts)
}

/// Builds `{prefix}/{feed_type}/dt={date}/{feed_type}_{fetch_ts}.jsonl`.
///
/// `feed_type` is used verbatim; it comes from configuration and is expected
/// to be key-safe.
pub fn build_key(prefix: &str, feed_type: &str, date: &str, fetch_ts: &str) -> String {
    format!("{prefix}/{feed_type}/dt={date}/{feed_type}_{fetch_ts}.jsonl")
}
