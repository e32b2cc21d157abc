//! LLM module - Multi-provider LLM client abstraction

mod anthropic;
mod client;
mod factory;
#[cfg(any(test, feature = "test-utils"))]
mod mock_client;
mod openai;
pub mod retry;

pub use anthropic::AnthropicClient;
pub use client::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, Role, TokenUsage,
};
pub use factory::{ClientSpec, DefaultLlmClientFactory, LlmClientFactory, LlmProvider};
#[cfg(any(test, feature = "test-utils"))]
pub use mock_client::{MockLlmClient, MockStep, MockStepKind};
pub use openai::OpenAIClient;
pub use retry::LlmRetryConfig;
