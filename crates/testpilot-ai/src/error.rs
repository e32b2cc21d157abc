//! Error types for the AI module

use thiserror::Error;

/// AI module error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{provider} request failed with status {status}: {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiError {
    /// Whether the failed request is worth repeating.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::LlmHttp { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            AiError::Http(err) => err.is_timeout() || err.is_connect(),
            AiError::Llm(message) => {
                let lower = message.to_lowercase();
                lower.contains("rate limit")
                    || lower.contains("overloaded")
                    || lower.contains("timeout")
            }
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AiError::LlmHttp {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;
