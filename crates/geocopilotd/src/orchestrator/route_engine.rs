//! Route query: a drive from A to B.

use super::Responder;
use crate::error::EngineError;
use crate::facts::{FactAssembler, RouteOutcome};
use crate::llm_client::TextGenerator;
use geocopilot_common::{
    Config, DefaultUserPrompts, EngineKind, PromptBuilder, RouteRequest, NO_ROUTE_MESSAGE,
};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct RouteEngine {
    assembler: FactAssembler,
    responder: Responder,
    user_prompts: DefaultUserPrompts,
}

impl RouteEngine {
    pub fn new(
        assembler: FactAssembler,
        generator: Arc<dyn TextGenerator>,
        config: &Config,
    ) -> Self {
        let builder =
            PromptBuilder::for_engine(&config.prompts, EngineKind::Route, config.llm.schema_mode);
        Self {
            assembler,
            responder: Responder::new(builder, generator),
            user_prompts: config.default_user_prompts.clone(),
        }
    }

    /// Answer text, or the fixed no-route message when no provider finds a path
    #[instrument(skip(self, request), fields(start = %request.start, end = %request.end))]
    pub async fn answer(&self, request: &RouteRequest) -> Result<String, EngineError> {
        let start = request.start.validated()?;
        let end = request.end.validated()?;
        let user_prompt = self
            .user_prompts
            .resolve(EngineKind::Route, request.prompt.as_deref());

        let facts = match self
            .assembler
            .route_facts(start, end, user_prompt.clone())
            .await?
        {
            RouteOutcome::Found(facts) => facts,
            RouteOutcome::NoRoute => {
                info!("No drivable route");
                return Ok(NO_ROUTE_MESSAGE.to_string());
            }
        };

        self.responder.respond(user_prompt.as_deref(), &facts).await
    }
}
