//! Generative-service collaborator.
//!
//! The pipeline only needs "prompt in, text out". Providers:
//! - `ChatCompletionsClient`: OpenAI-compatible `/chat/completions` (DeepSeek, OpenRouter)
//! - `OllamaClient`: local Ollama `/api/generate`
//! - `StandInService`: deterministic canned responses, no network
//!
//! `FallbackService` wraps a provider and answers with the stand-in when the
//! provider fails.

mod chat;
mod error;
mod fallback;
mod ollama;
mod standin;

pub use chat::ChatCompletionsClient;
pub use error::{classify_http_status, execute_with_retry, LlmError, LlmErrorKind, RetryConfig};
pub use fallback::FallbackService;
pub use ollama::OllamaClient;
pub use standin::StandInService;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, Provider};

/// Sampling temperature used for every stage.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Role in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Token usage information (if provided by the upstream provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage object ensuring `total_tokens` is consistent.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Trait for text-generation backends.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Complete `prompt`, producing at most `max_output_tokens` tokens.
    async fn complete(&self, prompt: &str, max_output_tokens: u64) -> Result<String, LlmError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<S: GenerativeService + ?Sized> GenerativeService for Arc<S> {
    async fn complete(&self, prompt: &str, max_output_tokens: u64) -> Result<String, LlmError> {
        (**self).complete(prompt, max_output_tokens).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the configured service, wrapped in the stand-in fallback when enabled.
pub fn create_service(config: &Config) -> Arc<dyn GenerativeService> {
    let primary: Arc<dyn GenerativeService> = match config.provider {
        Provider::DeepSeek | Provider::OpenRouter => Arc::new(ChatCompletionsClient::new(
            config.api_url.clone(),
            config.api_key.clone().unwrap_or_default(),
            config.model.clone(),
            config.request_timeout,
        )),
        Provider::Ollama => Arc::new(OllamaClient::new(
            config.ollama_url.clone(),
            config.ollama_model.clone(),
            config.request_timeout,
        )),
        Provider::Offline => return Arc::new(StandInService),
    };

    if config.standin_fallback {
        Arc::new(FallbackService::new(primary))
    } else {
        primary
    }
}
