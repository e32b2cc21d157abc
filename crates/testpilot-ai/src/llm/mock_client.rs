//! Deterministic mock LLM client for agent tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::{AiError, Result};

use super::{CompletionRequest, CompletionResponse, FinishReason, LlmClient, Role, TokenUsage};

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a plain assistant message.
    Text(String),
    /// Return an LLM error.
    Error(String),
    /// Return an empty completion.
    Empty,
}

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text(content.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Error(message.into()),
        }
    }

    pub fn empty() -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Empty,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A deterministic mock LLM client driven by scripted steps.
///
/// Every request is recorded so tests can assert on prompts and sampling
/// parameters after the fact.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self::from_steps(model, Vec::new())
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }

    fn usage_for(content_len: usize) -> TokenUsage {
        let completion_tokens = content_len as u32;
        TokenUsage {
            prompt_tokens: 1,
            completion_tokens,
            total_tokens: 1 + completion_tokens,
        }
    }

    fn fallback_response(request: &CompletionRequest) -> CompletionResponse {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|msg| matches!(msg.role, Role::User))
            .map(|msg| format!("mock-echo: {}", msg.content))
            .unwrap_or_else(|| "mock-ok".to_string());

        CompletionResponse {
            usage: Some(Self::usage_for(text.len())),
            content: Some(text),
            finish_reason: FinishReason::Stop,
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().await.push(request.clone());

        let Some(step) = self.next_step().await else {
            return Ok(Self::fallback_response(&request));
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text(content) => Ok(CompletionResponse {
                usage: Some(Self::usage_for(content.len())),
                content: Some(content),
                finish_reason: FinishReason::Stop,
            }),
            MockStepKind::Empty => Ok(CompletionResponse {
                content: None,
                finish_reason: FinishReason::Stop,
                usage: Some(Self::usage_for(0)),
            }),
            MockStepKind::Error(message) => Err(AiError::Llm(message)),
        }
    }
}
