//! Shared outbound HTTP plumbing.
//!
//! Every client owns one `reqwest::Client` built here, carrying the configured
//! User-Agent and a fixed per-service timeout. Clients are cheap to clone and
//! safe to share between concurrent requests.

use crate::error::UpstreamError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest error body kept in an `UpstreamError::Status`
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Build a client with the service's timeout and the configured User-Agent
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .context("Failed to build HTTP client")
}

/// Send a request, mapping transport failures onto `UpstreamError`
pub async fn send(
    service: &'static str,
    timeout: Duration,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, UpstreamError> {
    request
        .send()
        .await
        .map_err(|e| UpstreamError::from_reqwest(service, timeout, e))
}

/// Reject non-success statuses, keeping a short preview of the body
pub async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        service,
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

/// Decode a JSON body
pub async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<T, UpstreamError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| UpstreamError::from_reqwest(service, timeout, e))?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::decode(service, e.to_string()))
}

/// Trailing slashes dropped so paths can be appended with `format!`
pub fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
