//! HTTP retrieval of raw feed payloads.

mod basic;
mod client;

pub use basic::{BasicClient, USER_AGENT};
pub use client::HttpClient;

use std::time::Duration;

use bytes::Bytes;

use crate::error::FeedError;

/// Downloads the body at `url`, failing on transport errors, non-2xx status,
/// or when the whole exchange takes longer than `timeout`.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    timeout: Duration,
) -> Result<Bytes, FeedError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| FeedError::Fetch(format!("invalid feed url '{url}': {e}")))?;

    let mut req = reqwest::Request::new(reqwest::Method::GET, parsed);
    *req.timeout_mut() = Some(timeout);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vehicles.pb"))
            .and(header("user-agent", USER_AGENT))
            .and(header("accept-encoding", "identity"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        let url = format!("{}/vehicles.pb", server.uri());
        let bytes = fetch_bytes(&client, &url, TIMEOUT).await.unwrap();

        assert_eq!(bytes.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        let err = fetch_bytes(&client, &format!("{}/trips.pb", server.uri()), TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = BasicClient::new().unwrap();
        let err = fetch_bytes(
            &client,
            &format!("{}/alerts.pb", server.uri()),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn test_invalid_url_is_fetch_error() {
        let client = BasicClient::new().unwrap();
        let err = fetch_bytes(&client, "not a url", TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(err.to_string().contains("not a url"));
    }
}
