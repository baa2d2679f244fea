//! Runtime configuration, resolved from the environment once per invocation.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BUCKET: &str = "metro-gtfsrt-audit-v0";
pub const DEFAULT_PREFIX: &str = "jsonl";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 30;

/// Metro St. Louis feeds, polled when `FEED_URLS_JSON` is not set.
pub const DEFAULT_FEED_URLS: [(&str, &str); 3] = [
    (
        "vehicles",
        "https://www.metrostlouis.org/RealTimeData/StlRealTimeVehicles.pb",
    ),
    (
        "trips",
        "https://www.metrostlouis.org/RealTimeData/StlRealTimeTrips.pb",
    ),
    (
        "alerts",
        "https://www.metrostlouis.org/RealTimeData/StlRealTimeAlerts.pb",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bucket: String,
    pub timeout_seconds: u64,
    /// Feed type → source URL. Never empty.
    pub urls: BTreeMap<String, String>,
    /// Leading key segment; `jsonl` keeps the existing bucket layout.
    pub prefix: String,
    pub storage_timeout_seconds: u64,
}

impl Config {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a timeout is not an integer or if
    /// `FEED_URLS_JSON` is set but is not a non-empty object of strings.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = lookup("S3_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let prefix = lookup("S3_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        let timeout_seconds = parse_seconds(
            "HTTP_TIMEOUT_SECONDS",
            lookup("HTTP_TIMEOUT_SECONDS"),
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        let storage_timeout_seconds = parse_seconds(
            "S3_TIMEOUT_SECONDS",
            lookup("S3_TIMEOUT_SECONDS"),
            DEFAULT_STORAGE_TIMEOUT_SECS,
        )?;

        let urls = match lookup("FEED_URLS_JSON").filter(|raw| !raw.is_empty()) {
            Some(raw) => parse_feed_urls(&raw)?,
            None => DEFAULT_FEED_URLS
                .iter()
                .map(|(feed, url)| (feed.to_string(), url.to_string()))
                .collect(),
        };

        Ok(Self {
            bucket,
            timeout_seconds,
            urls,
            prefix,
            storage_timeout_seconds,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_seconds)
    }
}

fn parse_seconds(
    name: &'static str,
    raw: Option<String>,
    default: u64,
) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Timeout { name, value }),
    }
}

/// Parses the wholesale feed URL override.
pub fn parse_feed_urls(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let urls: BTreeMap<String, String> =
        serde_json::from_str(raw).map_err(|e| ConfigError::FeedUrls(e.to_string()))?;

    if urls.is_empty() {
        return Err(ConfigError::FeedUrls("object is empty".to_string()));
    }

    Ok(urls)
}
