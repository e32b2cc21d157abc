//! LLM client factory for configuration-driven client creation

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};
use crate::llm::retry::LlmRetryConfig;
use crate::llm::{AnthropicClient, LlmClient, OpenAIClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = AiError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(AiError::Llm(format!("Unknown LLM provider '{other}'"))),
        }
    }
}

/// Everything needed to build one concrete client.
#[derive(Debug, Clone)]
pub struct ClientSpec {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

pub trait LlmClientFactory: Send + Sync {
    fn create_client(&self, spec: &ClientSpec) -> Result<Arc<dyn LlmClient>>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultLlmClientFactory {
    retry_config: LlmRetryConfig,
}

impl DefaultLlmClientFactory {
    pub fn new(retry_config: LlmRetryConfig) -> Self {
        Self { retry_config }
    }
}

impl LlmClientFactory for DefaultLlmClientFactory {
    fn create_client(&self, spec: &ClientSpec) -> Result<Arc<dyn LlmClient>> {
        let key = spec
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AiError::Llm(format!("{} API key is required", spec.provider)))?;

        match spec.provider {
            LlmProvider::OpenAI => {
                let mut client = OpenAIClient::new(key)
                    .with_model(spec.model.clone())
                    .with_retry_config(self.retry_config.clone());
                if let Some(url) = &spec.base_url {
                    client = client.with_base_url(url.clone());
                }
                Ok(Arc::new(client))
            }
            LlmProvider::Anthropic => {
                let mut client = AnthropicClient::new(key)
                    .with_model(spec.model.clone())
                    .with_retry_config(self.retry_config.clone());
                if let Some(url) = &spec.base_url {
                    client = client.with_base_url(url.clone());
                }
                Ok(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(provider: LlmProvider, api_key: Option<&str>) -> ClientSpec {
        ClientSpec {
            provider,
            model: "m-1".to_string(),
            base_url: None,
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn provider_parses_aliases() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert_eq!("claude".parse::<LlmProvider>().unwrap(), LlmProvider::Anthropic);
        assert!("gemini".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn factory_requires_api_key() {
        let factory = DefaultLlmClientFactory::default();
        let err = factory
            .create_client(&spec(LlmProvider::OpenAI, None))
            .err()
            .unwrap();
        assert!(err.to_string().contains("API key is required"));
        assert!(factory
            .create_client(&spec(LlmProvider::Anthropic, Some("  ")))
            .is_err());
    }

    #[test]
    fn factory_builds_requested_provider() {
        let factory = DefaultLlmClientFactory::default();
        let client = factory
            .create_client(&spec(LlmProvider::Anthropic, Some("key")))
            .unwrap();
        assert_eq!(client.provider(), "anthropic");
        assert_eq!(client.model(), "m-1");
    }
}
