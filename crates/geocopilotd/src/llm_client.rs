//! Text generation against an Ollama-compatible `/api/generate` endpoint.
//!
//! The backend is stateless: one prompt in, one string out. Schema mode adds
//! `format: "json"` to the request; interpreting the reply is left to
//! `NarrativeReply`.

use crate::error::UpstreamError;
use crate::http;
use anyhow::Result;
use async_trait::async_trait;
use geocopilot_common::{LlmSettings, NarrativeReply, EMPTY_SUMMARY};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "ollama";

/// Characters of a reply kept in debug logs
const PREVIEW_CHARS: usize = 160;

/// Turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;

    /// Generate and read the reply as a structured narrative
    async fn generate_narrative(&self, prompt: &str) -> Result<NarrativeReply, UpstreamError> {
        let raw = self.generate(prompt).await?;
        Ok(NarrativeReply::parse(&raw))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Ollama client
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    json_format: bool,
    timeout: Duration,
    http: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(settings: &LlmSettings, user_agent: &str) -> Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        Ok(Self {
            base_url: http::trim_base(&settings.base_url),
            model: settings.model.clone(),
            json_format: settings.schema_mode,
            timeout,
            http: http::build_client(user_agent, timeout)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: self.json_format.then_some("json"),
        }
    }
}

/// Trimmed `response` field, or the empty-summary text when absent
fn reply_text(body: GenerateResponse) -> String {
    let text = body.response.unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        EMPTY_SUMMARY.to_string()
    } else {
        text.to_string()
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        debug!(
            "Generating with {} ({} prompt chars)",
            self.model,
            prompt.chars().count()
        );
        let request = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&self.request_body(prompt));
        let response = http::send(SERVICE, self.timeout, request).await?;
        let response = http::ensure_success(SERVICE, response).await?;
        let body: GenerateResponse = http::read_json(SERVICE, self.timeout, response).await?;
        let text = reply_text(body);
        debug!(
            "Reply preview: {}",
            text.chars().take(PREVIEW_CHARS).collect::<String>()
        );
        Ok(text)
    }
}
