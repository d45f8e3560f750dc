//! HTTP server for geocopilotd

use crate::facts::FactAssembler;
use crate::geocoding::NominatimGeocoder;
use crate::llm_client::{OllamaGenerator, TextGenerator};
use crate::orchestrator::{ChatEngine, RouteEngine};
use crate::pois::OverpassPoiFinder;
use crate::routes;
use crate::routing::RoutePlanner;
use anyhow::{Context, Result};
use axum::{body::Body, http::Request, Router};
use geocopilot_common::Config;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
pub struct AppState {
    pub chat: ChatEngine,
    pub route: RouteEngine,
    /// Whole-request bound, derived from the upstream timeouts
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(chat: ChatEngine, route: RouteEngine, request_timeout: Duration) -> Self {
        Self {
            chat,
            route,
            request_timeout,
        }
    }

    /// Both engines over one set of collaborators
    pub fn from_parts(
        assembler: FactAssembler,
        generator: Arc<dyn TextGenerator>,
        config: &Config,
    ) -> Self {
        Self::new(
            ChatEngine::new(assembler.clone(), generator.clone(), config),
            RouteEngine::new(assembler, generator, config),
            Duration::from_secs(config.request_timeout_secs()),
        )
    }

    /// Live clients for every upstream named in the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let user_agent = &config.services.user_agent;
        let geocoder = NominatimGeocoder::new(&config.services)
            .context("Failed to create geocoding client")?;
        let pois =
            OverpassPoiFinder::new(&config.services).context("Failed to create POI client")?;
        let router = RoutePlanner::from_settings(&config.routing, user_agent)
            .context("Failed to create routing clients")?;
        let generator = OllamaGenerator::new(&config.llm, user_agent)
            .context("Failed to create generation client")?;

        info!(
            "Upstreams: geocoder={} pois={} router={} model={}",
            config.services.nominatim_url,
            config.services.overpass_url,
            router.first_choice(),
            generator.model()
        );

        let assembler = FactAssembler::new(Arc::new(geocoder), Arc::new(pois), router);
        Ok(Self::from_parts(assembler, Arc::new(generator), config))
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let request_timeout = state.request_timeout;
    let state = Arc::new(state);

    Router::new()
        .merge(routes::query_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                id = %Uuid::new_v4(),
                method = %req.method(),
                uri = %req.uri()
            )
        }))
}

/// Run the HTTP server
pub async fn run(state: AppState, addr: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
