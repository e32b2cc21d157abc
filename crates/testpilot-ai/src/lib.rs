//! TestPilot AI - text-completion clients for the test orchestration agents
//!
//! This crate provides:
//! - Multi-provider LLM client (OpenAI-compatible, Anthropic)
//! - Retry with backoff for transient provider failures
//! - The single-prompt `generate_text` capability used by planner, generator and healer

pub mod error;
mod http_client;
pub mod llm;
pub mod text;

pub use error::{AiError, Result};
pub use llm::{
    AnthropicClient, ClientSpec, DefaultLlmClientFactory, LlmClient, LlmClientFactory,
    LlmProvider, LlmRetryConfig, Message, OpenAIClient, Role,
};
#[cfg(any(test, feature = "test-utils"))]
pub use llm::{MockLlmClient, MockStep};
pub use text::{ChatTextGenerator, TextGenerator};
