//! Single-feed ingestion: fetch, decode, transform, key, persist.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ErrorKind, FeedError};
use crate::fetch::{HttpClient, fetch_bytes};
use crate::keys::{FetchStamp, build_key};
use crate::parser::{header_timestamp, parse_feed};
use crate::records::{to_jsonl, to_records};
use crate::storage::{JSONL_CONTENT_TYPE, ObjectStore};

/// What was written for a feed that ingested cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    #[serde(rename = "entities")]
    pub entity_count: usize,
    pub key: String,
    #[serde(rename = "pb_bytes")]
    pub raw_bytes: usize,
    #[serde(rename = "jsonl_bytes")]
    pub json_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl std::fmt::Display for FeedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Success(FeedSummary),
    Failure(FeedFailure),
}

impl From<Result<FeedSummary, FeedError>> for FeedOutcome {
    fn from(result: Result<FeedSummary, FeedError>) -> Self {
        match result {
            Ok(summary) => FeedOutcome::Success(summary),
            Err(e) => FeedOutcome::Failure(FeedFailure {
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }
}

/// Runs the full pipeline for one feed. Never fails: errors come back as
/// [`FeedOutcome::Failure`].
pub async fn ingest_feed<C, S>(
    client: &C,
    store: &S,
    cfg: &Config,
    feed_type: &str,
    url: &str,
    stamp: &FetchStamp,
) -> FeedOutcome
where
    C: HttpClient + ?Sized,
    S: ObjectStore + ?Sized,
{
    let outcome: FeedOutcome = try_ingest(client, store, cfg, feed_type, url, stamp)
        .await
        .into();

    match &outcome {
        FeedOutcome::Success(summary) => info!(
            entities = summary.entity_count,
            key = %summary.key,
            "Wrote feed"
        ),
        FeedOutcome::Failure(failure) => warn!(
            kind = %failure.kind,
            error = %failure.message,
            "Feed ingestion failed"
        ),
    }

    outcome
}

async fn try_ingest<C, S>(
    client: &C,
    store: &S,
    cfg: &Config,
    feed_type: &str,
    url: &str,
    stamp: &FetchStamp,
) -> Result<FeedSummary, FeedError>
where
    C: HttpClient + ?Sized,
    S: ObjectStore + ?Sized,
{
    info!(url, "Fetching feed");
    let raw = fetch_bytes(client, url, cfg.http_timeout()).await?;
    debug!(bytes = raw.len(), "Feed bytes received, parsing");

    let feed = parse_feed(&raw)?;
    let source_header_ts = header_timestamp(&feed);
    debug!(
        entity_count = feed.entity.len(),
        source_header_ts = ?source_header_ts,
        "Feed parsed successfully"
    );

    let body = to_jsonl(to_records(
        feed_type,
        &feed.entity,
        &stamp.fetch_ts,
        source_header_ts,
    ))?;

    let key = build_key(&cfg.prefix, feed_type, &stamp.date, &stamp.fetch_ts);
    let json_bytes = body.len();
    store
        .put_object(&cfg.bucket, &key, body, JSONL_CONTENT_TYPE)
        .await?;

    Ok(FeedSummary {
        entity_count: feed.entity.len(),
        key,
        raw_bytes: raw.len(),
        json_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, FeedMessage};
    use crate::storage::MockObjectStore;
    use prost::Message;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> Config {
        Config {
            bucket: "test-bucket".to_string(),
            timeout_seconds: 5,
            urls: BTreeMap::new(),
            prefix: "jsonl".to_string(),
            storage_timeout_seconds: 5,
        }
    }

    fn stamp() -> FetchStamp {
        FetchStamp {
            fetch_ts: "2024-05-01T12:30:00Z".to_string(),
            date: "2024-05-01".to_string(),
        }
    }

    fn feed_bytes(ids: &[&str]) -> Vec<u8> {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                timestamp: Some(1714566590),
                ..Default::default()
            },
            entity: ids
                .iter()
                .map(|id| FeedEntity {
                    id: id.to_string(),
                    ..Default::default()
                })
                .collect(),
        }
        .encode_to_vec()
    }

    async fn serve(body: Vec<u8>) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.pb"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_success_writes_once() {
        let pb = feed_bytes(&["A", "B"]);
        let server = serve(pb.clone()).await;

        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .withf(|bucket, key, body, content_type| {
                bucket == "test-bucket"
                    && key == "jsonl/vehicles/dt=2024-05-01/vehicles_2024-05-01T12:30:00Z.jsonl"
                    && body.iter().filter(|&&b| b == b'\n').count() == 2
                    && content_type == "application/x-ndjson"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let client = BasicClient::new().unwrap();
        let url = format!("{}/feed.pb", server.uri());
        let outcome = ingest_feed(&client, &store, &config(), "vehicles", &url, &stamp()).await;

        let FeedOutcome::Success(summary) = &outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(summary.entity_count, 2);
        assert_eq!(summary.raw_bytes, pb.len());
        assert!(summary.json_bytes > 0);
        assert_eq!(
            summary.key,
            "jsonl/vehicles/dt=2024-05-01/vehicles_2024-05-01T12:30:00Z.jsonl"
        );
    }

    #[tokio::test]
    async fn test_garbage_is_decode_failure_without_write() {
        let server = serve(vec![0xFF, 0xFE, 0x00, 0x01]).await;

        let mut store = MockObjectStore::new();
        store.expect_put_object().times(0);

        let client = BasicClient::new().unwrap();
        let url = format!("{}/feed.pb", server.uri());
        let outcome = ingest_feed(&client, &store, &config(), "trips", &url, &stamp()).await;

        let FeedOutcome::Failure(failure) = &outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(failure.kind, ErrorKind::Decode);
        assert!(failure.to_string().starts_with("DecodeError: "));
    }

    #[tokio::test]
    async fn test_http_error_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut store = MockObjectStore::new();
        store.expect_put_object().times(0);

        let client = BasicClient::new().unwrap();
        let url = format!("{}/feed.pb", server.uri());
        let outcome = ingest_feed(&client, &store, &config(), "alerts", &url, &stamp()).await;

        assert!(matches!(
            outcome,
            FeedOutcome::Failure(FeedFailure {
                kind: ErrorKind::Fetch,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_storage_error_is_reported() {
        let server = serve(feed_bytes(&["A"])).await;

        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .times(1)
            .returning(|_, _, _, _| Err(FeedError::Storage("access denied".to_string())));

        let client = BasicClient::new().unwrap();
        let url = format!("{}/feed.pb", server.uri());
        let outcome = ingest_feed(&client, &store, &config(), "vehicles", &url, &stamp()).await;

        assert_eq!(
            outcome,
            FeedOutcome::Failure(FeedFailure {
                kind: ErrorKind::Storage,
                message: "access denied".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_empty_feed_writes_single_newline() {
        let server = serve(feed_bytes(&[])).await;

        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .withf(|_, _, body, _| body.as_slice() == b"\n")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let client = BasicClient::new().unwrap();
        let url = format!("{}/feed.pb", server.uri());
        let outcome = ingest_feed(&client, &store, &config(), "alerts", &url, &stamp()).await;

        let FeedOutcome::Success(summary) = &outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(summary.entity_count, 0);
        assert_eq!(summary.json_bytes, 1);
    }
}
