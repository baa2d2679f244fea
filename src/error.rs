//! Error types for configuration and per-feed ingestion.
//!
//! [`ConfigError`] is invocation-scoped: it aborts the run before any feed is
//! fetched. [`FeedError`] is feed-scoped: the ingestor turns it into a
//! [`FeedOutcome::Failure`](crate::ingest::FeedOutcome::Failure) and siblings
//! keep going.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FEED_URLS_JSON must be a non-empty JSON object of string URLs: {0}")]
    FeedUrls(String),

    #[error("{name} must be a non-negative integer number of seconds, got '{value}'")]
    Timeout { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{0}")]
    Fetch(String),

    #[error(transparent)]
    Decode(#[from] prost::DecodeError),

    #[error(transparent)]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Storage(String),
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::Fetch(_) => ErrorKind::Fetch,
            FeedError::Decode(_) => ErrorKind::Decode,
            FeedError::Encode(_) => ErrorKind::Encode,
            FeedError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        FeedError::Fetch(error_chain(&e))
    }
}

/// The stage of the pipeline a feed failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Decode,
    Encode,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Fetch => "FetchError",
            ErrorKind::Decode => "DecodeError",
            ErrorKind::Encode => "EncodeError",
            ErrorKind::Storage => "StorageError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders an error and all of its sources as `outer: inner: root`.
///
/// reqwest and the AWS SDK keep the useful detail (DNS failure, timeout,
/// HTTP status) in the source chain rather than the top-level message.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let inner_msg = inner.to_string();
        if !msg.ends_with(&inner_msg) {
            msg.push_str(": ");
            msg.push_str(&inner_msg);
        }
        source = inner.source();
    }
    msg
}
