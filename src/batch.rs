//! Invocation-level orchestration across all configured feeds.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;
use tracing::{Instrument, info, info_span};

use crate::config::Config;
use crate::fetch::HttpClient;
use crate::ingest::{FeedOutcome, FeedSummary, ingest_feed};
use crate::keys::FetchStamp;
use crate::storage::ObjectStore;

/// Overall health of one invocation, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Every feed was written.
    Ok,
    /// Some feeds were written, some failed.
    Partial,
    /// No feed was written.
    Failed,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Partial => 207,
            Status::Failed => 500,
        }
    }

    /// Process exit code for the scheduler: 0 healthy, 2 partial, 1 outage.
    pub fn exit_code(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Partial => 2,
            Status::Failed => 1,
        }
    }
}

/// Per-feed results of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvocationResult {
    pub results: BTreeMap<String, FeedSummary>,
    /// Feed type → `"ErrorKind: message"`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl InvocationResult {
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = (String, FeedOutcome)>,
    {
        let mut result = Self::default();
        for (feed_type, outcome) in outcomes {
            match outcome {
                FeedOutcome::Success(summary) => {
                    result.results.insert(feed_type, summary);
                }
                FeedOutcome::Failure(failure) => {
                    result.errors.insert(feed_type, failure.to_string());
                }
            }
        }
        result
    }

    pub fn status(&self) -> Status {
        if self.results.is_empty() {
            Status::Failed
        } else if !self.errors.is_empty() {
            Status::Partial
        } else {
            Status::Ok
        }
    }

    /// Renders the `{statusCode, body}` payload returned to the caller.
    pub fn to_response(&self) -> Result<InvocationResponse, serde_json::Error> {
        Ok(InvocationResponse {
            status_code: self.status().code(),
            body: serde_json::to_string(self)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded [`InvocationResult`].
    pub body: String,
}

/// Ingests every configured feed, stamping them all with the current time.
pub async fn run<C, S>(cfg: &Config, client: &C, store: &S) -> InvocationResult
where
    C: HttpClient + ?Sized,
    S: ObjectStore + ?Sized,
{
    let stamp = FetchStamp::now();
    run_at(cfg, client, store, &stamp).await
}

/// Ingests every configured feed concurrently under one shared `stamp`.
///
/// A failing feed never cancels or skips its siblings.
pub async fn run_at<C, S>(
    cfg: &Config,
    client: &C,
    store: &S,
    stamp: &FetchStamp,
) -> InvocationResult
where
    C: HttpClient + ?Sized,
    S: ObjectStore + ?Sized,
{
    info!(
        feeds = cfg.urls.len(),
        fetch_ts = %stamp.fetch_ts,
        bucket = %cfg.bucket,
        "Starting ingestion"
    );

    let tasks = cfg.urls.iter().map(|(feed_type, url)| {
        let span = info_span!("ingest_feed", feed_type = %feed_type);
        async move {
            let outcome = ingest_feed(client, store, cfg, feed_type, url, stamp).await;
            (feed_type.clone(), outcome)
        }
        .instrument(span)
    });

    let result = InvocationResult::from_outcomes(join_all(tasks).await);

    info!(
        status = result.status().code(),
        succeeded = result.results.len(),
        failed = result.errors.len(),
        "Ingestion finished"
    );

    result
}
