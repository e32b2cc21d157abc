use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use testpilot_ai::LlmProvider;
use testpilot_browser::{McpServerConfig, McpTransport};

/// A persisted text-completion client selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub id: String,
    pub name: String,
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key; the provider default when unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LlmConfig {
    pub fn new(name: impl Into<String>, provider: LlmProvider, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            provider,
            model: model.into(),
            base_url: None,
            api_key_env: None,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| default_key_env(self.provider))
    }
}

pub fn default_key_env(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAI => "OPENAI_API_KEY",
        LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
    }
}

pub fn default_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAI => "gpt-4o-mini",
        LlmProvider::Anthropic => "claude-sonnet-4-20250514",
    }
}

/// A persisted browser protocol server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub transport: McpTransport,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub tool_aliases: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl ProtocolConfig {
    pub fn streamable_http(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            transport: McpTransport::StreamableHttp,
            url: Some(url.into()),
            command: None,
            args: Vec::new(),
            headers: HashMap::new(),
            enabled: true,
            tool_aliases: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_server_config(&self) -> McpServerConfig {
        let mut config = McpServerConfig::streamable_http(
            self.name.clone(),
            self.url.clone().unwrap_or_default(),
        );
        config.transport = self.transport;
        config.url = self.url.clone();
        config.command = self.command.clone();
        config.args = self.args.clone();
        config.headers = self.headers.clone();
        config.tool_aliases = self.tool_aliases.clone();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_env_falls_back_to_provider_default() {
        let mut config = LlmConfig::new("main", LlmProvider::Anthropic, "m");
        assert_eq!(config.key_env(), "ANTHROPIC_API_KEY");
        config.api_key_env = Some("MY_KEY".to_string());
        assert_eq!(config.key_env(), "MY_KEY");
    }

    #[test]
    fn protocol_config_maps_to_server_config() {
        let mut config = ProtocolConfig::streamable_http("n-tester", "http://127.0.0.1:8006");
        config
            .tool_aliases
            .insert("screenshot".to_string(), "enhanced_screenshot".to_string());
        let server = config.to_server_config();
        assert_eq!(server.url.as_deref(), Some("http://127.0.0.1:8006"));
        assert_eq!(server.tool_aliases["screenshot"], "enhanced_screenshot");
    }
}
