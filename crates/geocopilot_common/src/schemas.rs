//! Request and response bodies of the HTTP API.

use crate::types::Coordinate;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub location: Coordinate,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub radius_m: Option<u32>,
}

/// Body of `POST /api/route`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: Coordinate,
    pub end: Coordinate,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Reply of both query endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// Reply of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_optional_fields() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"location": {"lat": 44.1, "lon": 7.5}}"#).unwrap();
        assert_eq!(req.location, Coordinate { lat: 44.1, lon: 7.5 });
        assert!(req.prompt.is_none());
        assert!(req.radius_m.is_none());
    }

    #[test]
    fn test_route_request() {
        let req: RouteRequest = serde_json::from_str(
            r#"{"start": {"lat": 0, "lon": 0}, "end": {"lat": 1, "lon": 1}, "prompt": "fast"}"#,
        )
        .unwrap();
        assert_eq!(req.end, Coordinate { lat: 1.0, lon: 1.0 });
        assert_eq!(req.prompt.as_deref(), Some("fast"));
    }
}
