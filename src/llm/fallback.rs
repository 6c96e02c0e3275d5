//! Stand-in fallback wrapper.

use async_trait::async_trait;

use super::{GenerativeService, LlmError, StandInService};

/// Answers with the primary service, or with [`StandInService`] when the
/// primary fails.
pub struct FallbackService<S> {
    primary: S,
    standin: StandInService,
}

impl<S: GenerativeService> FallbackService<S> {
    pub fn new(primary: S) -> Self {
        Self {
            primary,
            standin: StandInService,
        }
    }
}

#[async_trait]
impl<S: GenerativeService> GenerativeService for FallbackService<S> {
    async fn complete(&self, prompt: &str, max_output_tokens: u64) -> Result<String, LlmError> {
        match self.primary.complete(prompt, max_output_tokens).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(
                    service = self.primary.name(),
                    kind = %e.kind,
                    "Generative service failed, answering with stand-in: {}",
                    e.message
                );
                self.standin.complete(prompt, max_output_tokens).await
            }
        }
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_records;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Broken {
        calls: AtomicU32,
    }

    #[async_trait]
    impl GenerativeService for Broken {
        async fn complete(&self, _prompt: &str, _max: u64) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::client_error(401, "invalid api key".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    struct Echo;

    #[async_trait]
    impl GenerativeService for Echo {
        async fn complete(&self, prompt: &str, _max: u64) -> Result<String, LlmError> {
            Ok(format!("echo: {}", prompt))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_primary_answer_passes_through() {
        let service = FallbackService::new(Echo);
        assert_eq!(service.complete("oi", 10).await.unwrap(), "echo: oi");
    }

    #[tokio::test]
    async fn test_failure_answers_with_standin() {
        let service = FallbackService::new(Broken {
            calls: AtomicU32::new(0),
        });
        let prompt = "Você é um Professor-Conteudista.\nObj.1: Explicar evaporação\n";
        let text = service.complete(prompt, 4000).await.unwrap();

        assert_eq!(service.primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(extract_records(&text).len(), 1);
        assert_eq!(service.name(), "broken");
    }
}
