//! CLI configuration file support
//!
//! Loads configuration from ~/.config/testpilot/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use testpilot_browser::ScriptLanguage;

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub default: DefaultConfig,
    #[serde(default)]
    pub llm: LlmDefaults,
    #[serde(default)]
    pub api_keys: ApiKeysConfig,
}

/// Defaults for phase commands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultConfig {
    pub db_path: Option<String>,
    /// Protocol server used when `--protocol` is not given
    pub protocol_url: Option<String>,
    pub headless: Option<bool>,
    pub language: Option<String>,
}

/// Seed for the default LLM config on first run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmDefaults {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
}

impl CliConfig {
    /// Load configuration from default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load configuration from a specific path; missing or invalid files yield defaults.
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("testpilot").join("config.toml"))
    }

    pub fn language(&self) -> ScriptLanguage {
        self.default
            .language
            .as_deref()
            .map(ScriptLanguage::from_tag)
            .unwrap_or_default()
    }

    pub fn headless(&self) -> bool {
        self.default.headless.unwrap_or(true)
    }

    /// Apply API keys to environment variables
    ///
    /// # Safety
    /// This modifies environment variables which can cause issues in multi-threaded contexts.
    /// Should only be called early in main() before spawning threads.
    pub fn apply_api_key_env(&self) {
        let pairs = [
            ("ANTHROPIC_API_KEY", &self.api_keys.anthropic),
            ("OPENAI_API_KEY", &self.api_keys.openai),
        ];
        for (name, key) in pairs {
            if let Some(key) = key
                && std::env::var(name).is_err()
            {
                // SAFETY: Called early in main() before spawning threads
                unsafe { std::env::set_var(name, key) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_all_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[default]
protocol_url = "http://127.0.0.1:8006"
headless = false
language = "python"

[llm]
provider = "anthropic"

[api_keys]
openai = "sk-test"
"#,
        )
        .unwrap();

        let config = CliConfig::load_from_path(Some(path));
        assert_eq!(config.language(), ScriptLanguage::Python);
        assert!(!config.headless());
        assert_eq!(config.llm.provider.as_deref(), Some("anthropic"));
        assert_eq!(config.api_keys.openai.as_deref(), Some("sk-test"));
    }

    #[test]
    fn invalid_or_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let config = CliConfig::load_from_path(Some(path));
        assert!(config.headless());
        assert_eq!(config.language(), ScriptLanguage::Typescript);

        let missing = CliConfig::load_from_path(Some(dir.path().join("absent.toml")));
        assert!(missing.default.protocol_url.is_none());
    }
}
