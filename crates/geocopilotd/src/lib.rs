//! GeoCopilot daemon library.
//!
//! Gathers reverse-geocoding, POI and routing facts for a location or a
//! drive, then asks a text generation backend to narrate them under a
//! configurable rule set.

pub mod error;
pub mod facts;
pub mod fakes;
pub mod geocoding;
pub mod http;
pub mod llm_client;
pub mod orchestrator;
pub mod pois;
pub mod routes;
pub mod routing;
pub mod server;

pub use error::{EngineError, UpstreamError};
pub use facts::{FactAssembler, RouteOutcome};
pub use orchestrator::{ChatEngine, RouteEngine};
pub use routing::RoutePlanner;
pub use server::{build_router, AppState};
