//! API routes for geocopilotd

use crate::error::EngineError;
use crate::server::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use geocopilot_common::{ChatRequest, HealthResponse, RouteRequest, SummaryResponse};
use std::sync::Arc;
use tracing::{error, info, warn};

type AppStateArc = Arc<AppState>;

/// Map an engine failure onto an HTTP status and message
fn error_response(err: EngineError) -> (StatusCode, String) {
    match &err {
        EngineError::InvalidInput(_) | EngineError::InvalidRadius => {
            warn!("Rejected request: {}", err);
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        EngineError::Upstream(_) => {
            error!("Upstream failure: {}", err);
            (StatusCode::BAD_GATEWAY, err.to_string())
        }
        EngineError::Facts(_) => {
            error!("Request failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

// ============================================================================
// Query Routes
// ============================================================================

pub fn query_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/route", post(route))
}

async fn chat(
    State(state): State<AppStateArc>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<SummaryResponse>, (StatusCode, String)> {
    info!("Chat query at {}", req.location);
    let summary = state.chat.answer(&req).await.map_err(error_response)?;
    Ok(Json(SummaryResponse { summary }))
}

async fn route(
    State(state): State<AppStateArc>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<SummaryResponse>, (StatusCode, String)> {
    info!("Route query {} -> {}", req.start, req.end);
    let summary = state.route.answer(&req).await.map_err(error_response)?;
    Ok(Json(SummaryResponse { summary }))
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
