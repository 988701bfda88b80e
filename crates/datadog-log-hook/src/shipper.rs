// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of one detached batch to the logs intake.
//!
//! Each batch is sent as exactly one `POST` carrying the API key header. There
//! is no retry: whatever goes wrong after the batch was detached, the batch is
//! dropped and the error is returned. The response status is logged but does
//! not change the outcome, so an intake rejection is only visible in the logs.

use crate::batch::Batch;
use crate::config::Config;
use crate::constants::API_KEY_HEADER;
use crate::errors::FlushError;
use crate::http::get_client;
use crate::payload::encode_payload;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Shipper {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    compression_level: Option<i32>,
}

impl Shipper {
    #[must_use]
    pub fn new(api_key: String, config: &Config) -> Self {
        Shipper {
            client: get_client(config),
            endpoint: config.post_url.clone(),
            api_key,
            compression_level: config.compression_level,
        }
    }

    pub async fn ship(&self, batch: Batch) -> Result<(), FlushError> {
        let generation = batch.generation();
        let n_records = batch.len();

        let body = encode_payload(batch.records(), self.compression_level)?;
        drop(batch);
        let request = self.create_request(body)?;

        let time = Instant::now();
        let resp = request.send().await?;
        let elapsed = time.elapsed();

        let status = resp.status();
        if status == StatusCode::FORBIDDEN {
            warn!(
                "LOGS | Batch {} was denied by Datadog: Access denied. Please verify that your API key is valid.",
                generation
            );
        } else if !status.is_success() {
            warn!(
                "LOGS | Batch {} of {} records got status {} after {} ms",
                generation,
                n_records,
                status,
                elapsed.as_millis()
            );
        } else {
            debug!(
                "LOGS | Shipped batch {} of {} records in {} ms",
                generation,
                n_records,
                elapsed.as_millis()
            );
        }

        Ok(())
    }

    fn create_request(&self, body: Vec<u8>) -> Result<reqwest::RequestBuilder, FlushError> {
        let url = reqwest::Url::parse(&self.endpoint).map_err(|e| FlushError::Request {
            url: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        let headers = self.headers()?;
        Ok(self.client.post(url).headers(headers).body(body))
    }

    fn headers(&self) -> Result<HeaderMap, FlushError> {
        let api_key = HeaderValue::from_str(&self.api_key).map_err(|e| FlushError::Request {
            url: self.endpoint.clone(),
            reason: format!("API key is not a valid header value: {e}"),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if self.compression_level.is_some() {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("zstd"));
        }
        Ok(headers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Options;
    use mockito::{Matcher, Server};
    use tracing_test::traced_test;

    fn batch(records: &[&str]) -> Batch {
        Batch::from_records(records.iter().map(|r| r.as_bytes().to_vec()).collect(), 7)
    }

    fn shipper(url: &str, compression_level: Option<i32>) -> Shipper {
        let mut options = Options::default().post_url(url);
        options.compression_level = compression_level;
        Shipper::new("test-api-key".to_string(), &options.resolve())
    }

    #[test]
    fn test_headers_without_compression() {
        let headers = shipper("https://example.com/v1/input", None).headers().unwrap();
        assert_eq!(headers.get("DD-API-KEY").unwrap(), "test-api-key");
        assert_eq!(headers.get("Content-Type").unwrap(), "application/json");
        assert!(!headers.contains_key("Content-Encoding"));
    }

    #[test]
    fn test_headers_with_compression() {
        let headers = shipper("https://example.com/v1/input", Some(3))
            .headers()
            .unwrap();
        assert_eq!(headers.get("Content-Encoding").unwrap(), "zstd");
    }

    #[tokio::test]
    async fn test_malformed_url_is_a_request_error() {
        let result = shipper("not a url", None).ship(batch(&["{}"])).await;
        assert!(matches!(result, Err(FlushError::Request { .. })));
    }

    #[tokio::test]
    async fn test_invalid_api_key_is_a_request_error() {
        let config = Options::default().post_url("https://example.com").resolve();
        let shipper = Shipper::new("bad\nkey".to_string(), &config);
        let result = shipper.ship(batch(&["{}"])).await;
        assert!(matches!(result, Err(FlushError::Request { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_transport_error() {
        let result = shipper("http://127.0.0.1:1/v1/input", None)
            .ship(batch(&["{}"]))
            .await;
        assert!(matches!(result, Err(FlushError::Transport(_))));
    }

    #[tokio::test]
    async fn test_ship_posts_json_array() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/input")
            .match_header("DD-API-KEY", "test-api-key")
            .match_header("Content-Type", "application/json")
            .match_body(Matcher::Exact(r#"[{"a":1},{"b":2}]"#.to_string()))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/v1/input", server.url());
        shipper(&url, None)
            .ship(batch(&[r#"{"a":1}"#, r#"{"b":2}"#]))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ship_empty_batch_posts_empty_array() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/input")
            .match_body(Matcher::Exact("[]".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let url = format!("{}/v1/input", server.url());
        shipper(&url, None).ship(batch(&[])).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn test_rejection_status_is_not_an_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/input")
            .with_status(403)
            .create_async()
            .await;

        let url = format!("{}/v1/input", server.url());
        let result = shipper(&url, None).ship(batch(&["{}"])).await;
        assert!(result.is_ok());
        mock.assert_async().await;
        assert!(logs_contain("Access denied"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_server_error_status_is_not_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/input")
            .with_status(500)
            .create_async()
            .await;

        let url = format!("{}/v1/input", server.url());
        assert!(shipper(&url, None).ship(batch(&["{}"])).await.is_ok());
        assert!(logs_contain("got status 500"));
    }
}
