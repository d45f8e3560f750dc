//! Request orchestration for point and route queries.
//!
//! Each engine validates input, gathers facts, builds one prompt and makes
//! exactly one generation call. Engines are immutable and shared across
//! concurrent requests.

mod chat_engine;
mod route_engine;

pub use chat_engine::ChatEngine;
pub use route_engine::RouteEngine;

use crate::error::EngineError;
use crate::llm_client::TextGenerator;
use geocopilot_common::PromptBuilder;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prompt building plus generation, shared by both engines
#[derive(Clone)]
pub struct Responder {
    builder: PromptBuilder,
    generator: Arc<dyn TextGenerator>,
}

impl Responder {
    pub fn new(builder: PromptBuilder, generator: Arc<dyn TextGenerator>) -> Self {
        Self { builder, generator }
    }

    /// Render facts into a prompt and return the generated answer text
    pub async fn respond<F: Serialize + Sync>(
        &self,
        user_request: Option<&str>,
        facts: &F,
    ) -> Result<String, EngineError> {
        let prompt = self.builder.build(user_request, facts)?;
        debug!("Prompt built ({} chars)", prompt.chars().count());

        if !self.builder.schema_mode() {
            let text = self.generator.generate(&prompt).await?;
            return Ok(text.trim().to_string());
        }

        let reply = self.generator.generate_narrative(&prompt).await?;
        if reply.is_degraded() {
            warn!("Narrative reply degraded to raw text");
        }
        Ok(reply.render())
    }
}
