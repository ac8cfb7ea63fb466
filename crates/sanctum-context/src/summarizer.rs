//! Condensing turns that fall out of the window

use std::sync::Arc;

use async_trait::async_trait;
use sanctum_runtime::{AIProvider, GenerateRequest};
use tracing::{debug, warn};

use crate::error::{ContextError, ContextResult};
use crate::message::Message;

/// Used whenever a summary cannot be produced.
pub const FALLBACK_SUMMARY: &str =
    "Earlier parts of this conversation touched on several personal and spiritual topics.";

pub const DEFAULT_SUMMARY_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_OPENAI_SUMMARY_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 200;
pub const DEFAULT_SUMMARY_TEMPERATURE: f32 = 0.3;

const SUMMARY_INSTRUCTION: &str = "Summarize this conversation between a user and their \
spiritual companion in a few sentences. Focus on the key topics, emotional and spiritual \
themes, and anything the companion needs to remember to continue the conversation naturally. \
Write in the third person and do not add commentary.";

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[Message]) -> ContextResult<String>;

    /// Summarize, or log the failure and return [`FALLBACK_SUMMARY`].
    async fn summarize_or_fallback(&self, messages: &[Message]) -> String {
        match self.summarize(messages).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(
                    phase = "summarize",
                    error = %err,
                    "summarization failed, using fallback summary"
                );
                #[cfg(feature = "metrics")]
                crate::metrics::record_collaborator_error("summarize");
                FALLBACK_SUMMARY.to_string()
            }
        }
    }
}

/// Small fast model for a provider name, as used by `provider_from_env`
pub fn default_summary_model(provider: &str) -> &'static str {
    match provider {
        "openai" => DEFAULT_OPENAI_SUMMARY_MODEL,
        _ => DEFAULT_SUMMARY_MODEL,
    }
}

/// Render messages as `"<Role>: <content>"` lines
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summarizer backed by a completion provider, using a small fast model
pub struct ProviderSummarizer {
    provider: Arc<dyn AIProvider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ProviderSummarizer {
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        let model = default_summary_model(provider.name()).to_string();
        Self {
            provider,
            model,
            max_tokens: DEFAULT_SUMMARY_MAX_TOKENS,
            temperature: DEFAULT_SUMMARY_TEMPERATURE,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request(&self, messages: &[Message]) -> GenerateRequest {
        GenerateRequest::new(render_transcript(messages))
            .with_system(SUMMARY_INSTRUCTION)
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }
}

#[async_trait]
impl Summarizer for ProviderSummarizer {
    async fn summarize(&self, messages: &[Message]) -> ContextResult<String> {
        debug!(
            provider = self.provider.name(),
            model = %self.model,
            messages = messages.len(),
            "requesting conversation summary"
        );
        let response = self.provider.generate(self.request(messages)).await?;
        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(ContextError::EmptySummary);
        }
        Ok(summary.to_string())
    }
}
