//! OpenAI-compatible chat-completions client with automatic retry for transient errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{execute_with_retry, LlmError, RetryConfig};
use super::{ChatMessage, GenerativeService, Role, TokenUsage, DEFAULT_TEMPERATURE};

/// Client for any `/chat/completions` endpoint (DeepSeek, OpenRouter, ...).
pub struct ChatCompletionsClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    retry_config: RetryConfig,
}

/// Build a `reqwest` client with a request timeout.
pub(super) fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
            Client::new()
        })
}

/// Parse Retry-After header if present.
pub(super) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl ChatCompletionsClient {
    /// Create a client with default retry configuration.
    pub fn new(api_url: String, api_key: String, model: String, timeout: Duration) -> Self {
        Self::with_retry_config(api_url, api_key, model, timeout, RetryConfig::default())
    }

    /// Create a client with custom retry configuration.
    pub fn with_retry_config(
        api_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            client: http_client(timeout),
            api_url,
            api_key,
            model,
            retry_config,
        }
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(LlmError::from_reqwest)?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &body, retry_after));
        }

        parse_chat_response(&body)
    }
}

/// Pull the first choice's text out of a response body.
fn parse_chat_response(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponseBody = serde_json::from_str(body).map_err(|e| {
        LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
    })?;

    if let Some(usage) = parsed.usage {
        let usage = TokenUsage::new(usage.prompt_tokens, usage.completion_tokens);
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "Chat completion usage"
        );
    }

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::parse_error("No choices in response".to_string()))?;

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(LlmError::empty_response(format!(
            "No content in response (finish_reason: {})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        ))),
    }
}

#[async_trait]
impl GenerativeService for ChatCompletionsClient {
    async fn complete(&self, prompt: &str, max_output_tokens: u64) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::new(Role::User, prompt)],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: max_output_tokens,
        };

        tracing::debug!(model = %self.model, url = %self.api_url, "Sending chat completion request");

        execute_with_retry(&self.retry_config, "chat_completions", || {
            self.execute_request(&request)
        })
        .await
    }

    fn name(&self) -> &str {
        "chat_completions"
    }
}

/// Chat-completions request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u64,
}

/// Chat-completions response format.
#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Usage data (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;

    #[test]
    fn test_parse_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"```json\n{}\n```"},"finish_reason":"stop"}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "```json\n{}\n```");
    }

    #[test]
    fn test_empty_content_is_an_error() {
        let body = r#"{"choices":[{"message":{"content":null},"finish_reason":"length"}]}"#;
        let err = parse_chat_response(body).unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::EmptyResponse);
        assert!(err.message.contains("length"));
    }

    #[test]
    fn test_garbage_body() {
        assert_eq!(
            parse_chat_response("<html>").unwrap_err().kind,
            LlmErrorKind::ParseError
        );
        assert_eq!(
            parse_chat_response(r#"{"choices":[]}"#).unwrap_err().kind,
            LlmErrorKind::ParseError
        );
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "deepseek-chat".into(),
            messages: vec![ChatMessage::new(Role::User, "oi")],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: 4000,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["max_tokens"], 4000);
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("retry-after", "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
    }
}
