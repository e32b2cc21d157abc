//! Single-prompt text completion used by the orchestration agents.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AiError, Result};
use crate::llm::{CompletionRequest, LlmClient, Message};

/// `generate_text(prompt, temperature, max_tokens) -> text`
///
/// Implementations may answer with an error envelope (a JSON object with a
/// non-success `status`) instead of failing; callers inspect the text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str, temperature: f32, max_tokens: u32)
    -> Result<String>;

    /// Short label for logs, e.g. `openai/gpt-4o`.
    fn describe(&self) -> String {
        "text-generator".to_string()
    }
}

/// Adapts any chat client to [`TextGenerator`] with one user message.
pub struct ChatTextGenerator {
    client: Arc<dyn LlmClient>,
}

impl ChatTextGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TextGenerator for ChatTextGenerator {
    async fn generate_text(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let request = CompletionRequest::new(vec![Message::user(prompt)])
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);

        tracing::debug!(
            provider = self.client.provider(),
            model = self.client.model(),
            prompt_chars = prompt.len(),
            temperature,
            max_tokens,
            "Requesting completion"
        );

        let response = self.client.complete(request).await?;
        response.content.ok_or_else(|| {
            AiError::InvalidFormat(format!(
                "{} returned an empty completion",
                self.client.provider()
            ))
        })
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.client.provider(), self.client.model())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, MockStep};

    #[tokio::test]
    async fn forwards_sampling_parameters() {
        let mock = Arc::new(MockLlmClient::from_steps(
            "mock-model",
            vec![MockStep::text("answer")],
        ));
        let generator = ChatTextGenerator::new(mock.clone());

        let text = generator.generate_text("question", 0.7, 4000).await.unwrap();
        assert_eq!(text, "answer");

        let requests = mock.requests().await;
        assert_eq!(requests[0].temperature, Some(0.7));
        assert_eq!(requests[0].max_tokens, Some(4000));
        assert_eq!(requests[0].messages[0].content, "question");
        assert_eq!(generator.describe(), "mock/mock-model");
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let mock = Arc::new(MockLlmClient::from_steps("m", vec![MockStep::empty()]));
        let generator = ChatTextGenerator::new(mock);

        let err = generator.generate_text("q", 0.2, 10).await.unwrap_err();
        assert!(matches!(err, AiError::InvalidFormat(_)));
    }
}
