//! Ollama `/api/generate` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::chat::{http_client, parse_retry_after};
use super::error::{execute_with_retry, LlmError, RetryConfig};
use super::{GenerativeService, DEFAULT_TEMPERATURE};

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    retry_config: RetryConfig,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url,
            model,
            retry_config: RetryConfig {
                max_retries: 1,
                ..RetryConfig::default()
            },
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    async fn execute_request(&self, request: &GenerateRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
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

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(format!("Failed to parse Ollama response: {}", e))
        })?;
        if parsed.response.trim().is_empty() {
            return Err(LlmError::empty_response("Ollama returned no text".to_string()));
        }
        Ok(parsed.response)
    }
}

#[async_trait]
impl GenerativeService for OllamaClient {
    async fn complete(&self, prompt: &str, max_output_tokens: u64) -> Result<String, LlmError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: DEFAULT_TEMPERATURE,
                num_predict: max_output_tokens,
            },
        };
        tracing::debug!(model = %self.model, url = %self.endpoint(), "Sending Ollama generate request");
        execute_with_retry(&self.retry_config, "ollama", || self.execute_request(&request)).await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
