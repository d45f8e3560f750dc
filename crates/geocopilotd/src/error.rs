//! Error types for outbound calls and request orchestration.

use geocopilot_common::CoordinateError;
use std::time::Duration;

/// Failure talking to an external service
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {message}")]
    Http {
        service: &'static str,
        message: String,
    },

    #[error("{service} timed out after {secs} seconds")]
    Timeout { service: &'static str, secs: u64 },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an unexpected payload: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl UpstreamError {
    /// Classify a reqwest failure for the given service
    pub fn from_reqwest(service: &'static str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout {
                service,
                secs: timeout.as_secs(),
            }
        } else if err.is_decode() {
            UpstreamError::Decode {
                service,
                message: err.to_string(),
            }
        } else {
            UpstreamError::Http {
                service,
                message: err.to_string(),
            }
        }
    }

    pub fn decode(service: &'static str, message: impl Into<String>) -> Self {
        UpstreamError::Decode {
            service,
            message: message.into(),
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            UpstreamError::Http { service, .. }
            | UpstreamError::Timeout { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::Decode { service, .. } => service,
        }
    }
}

/// Failure of a chat or route request
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] CoordinateError),

    #[error("invalid input: radius_m must be greater than zero")]
    InvalidRadius,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("failed to serialize facts: {0}")]
    Facts(#[from] serde_json::Error),
}
