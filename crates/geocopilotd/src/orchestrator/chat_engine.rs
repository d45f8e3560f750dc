//! Point query: "what is around here?"

use super::Responder;
use crate::error::EngineError;
use crate::facts::FactAssembler;
use crate::llm_client::TextGenerator;
use geocopilot_common::{ChatRequest, Config, DefaultUserPrompts, EngineKind, PromptBuilder};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct ChatEngine {
    assembler: FactAssembler,
    responder: Responder,
    user_prompts: DefaultUserPrompts,
    default_radius_m: u32,
}

impl ChatEngine {
    pub fn new(
        assembler: FactAssembler,
        generator: Arc<dyn TextGenerator>,
        config: &Config,
    ) -> Self {
        let builder =
            PromptBuilder::for_engine(&config.prompts, EngineKind::Chat, config.llm.schema_mode);
        Self {
            assembler,
            responder: Responder::new(builder, generator),
            user_prompts: config.default_user_prompts.clone(),
            default_radius_m: config.default_radius_m,
        }
    }

    #[instrument(skip(self, request), fields(lat = request.location.lat, lon = request.location.lon))]
    pub async fn answer(&self, request: &ChatRequest) -> Result<String, EngineError> {
        let location = request.location.validated()?;
        let radius_m = match request.radius_m {
            Some(0) => return Err(EngineError::InvalidRadius),
            Some(radius_m) => radius_m,
            None => self.default_radius_m,
        };
        let user_prompt = self
            .user_prompts
            .resolve(EngineKind::Chat, request.prompt.as_deref());

        let facts = self
            .assembler
            .point_facts(location, radius_m, user_prompt.clone())
            .await?;
        info!("Chat facts ready: {} POIs", facts.pois.len());

        self.responder.respond(user_prompt.as_deref(), &facts).await
    }
}
