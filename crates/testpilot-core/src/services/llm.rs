//! LLM config management and text-generator resolution.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use testpilot_ai::{ClientSpec, LlmProvider, TextGenerator};
use tracing::{debug, info};

use crate::AppCore;
use crate::models::{LlmConfig, default_key_env, default_model};

pub async fn create_config(core: &Arc<AppCore>, mut config: LlmConfig) -> Result<LlmConfig> {
    if config.name.trim().is_empty() {
        bail!("LLM config name must not be empty");
    }
    if config.model.trim().is_empty() {
        config.model = default_model(config.provider).to_string();
    }
    if config.is_default {
        clear_default(core)?;
    }
    core.storage
        .llm_configs
        .save(&config)
        .context("Failed to save LLM config")?;
    info!(config_id = %config.id, provider = %config.provider, "LLM config created");
    Ok(config)
}

pub async fn list_configs(core: &Arc<AppCore>) -> Result<Vec<LlmConfig>> {
    core.storage.llm_configs.list()
}

pub async fn get_config(core: &Arc<AppCore>, id: &str) -> Result<LlmConfig> {
    core.storage.llm_configs.require(id)
}

pub async fn delete_config(core: &Arc<AppCore>, id: &str) -> Result<()> {
    if !core.storage.llm_configs.delete(id)? {
        bail!("LLM config {} not found", id);
    }
    Ok(())
}

/// Make `id` the only default config.
pub async fn set_default(core: &Arc<AppCore>, id: &str) -> Result<LlmConfig> {
    let mut config = core.storage.llm_configs.require(id)?;
    clear_default(core)?;
    config.is_default = true;
    config.updated_at = Utc::now();
    core.storage.llm_configs.save(&config)?;
    Ok(config)
}

fn clear_default(core: &AppCore) -> Result<()> {
    for mut config in core.storage.llm_configs.list()? {
        if config.is_default {
            config.is_default = false;
            config.updated_at = Utc::now();
            core.storage.llm_configs.save(&config)?;
        }
    }
    Ok(())
}

/// The config a phase runs with: explicit id, else the default, else none.
///
/// An explicit id that does not exist is an error.
pub fn select_config(core: &AppCore, id: Option<&str>) -> Result<Option<LlmConfig>> {
    match id {
        Some(id) => core.storage.llm_configs.require(id).map(Some),
        None => core.storage.llm_configs.find_default(),
    }
}

/// Client spec for `config`, or from the environment when there is none.
pub fn client_spec(config: Option<&LlmConfig>, env: impl Fn(&str) -> Option<String>) -> ClientSpec {
    let lookup = |name: &str| env(name).filter(|value| !value.trim().is_empty());

    match config {
        Some(config) => ClientSpec {
            provider: config.provider,
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            api_key: lookup(config.key_env()),
        },
        None => {
            let provider = if lookup(default_key_env(LlmProvider::OpenAI)).is_some() {
                LlmProvider::OpenAI
            } else if lookup(default_key_env(LlmProvider::Anthropic)).is_some() {
                LlmProvider::Anthropic
            } else {
                LlmProvider::OpenAI
            };
            ClientSpec {
                provider,
                model: default_model(provider).to_string(),
                base_url: None,
                api_key: lookup(default_key_env(provider)),
            }
        }
    }
}

/// Build the text generator for `config`, reading keys from the process environment.
pub fn text_generator(core: &AppCore, config: Option<&LlmConfig>) -> Result<Arc<dyn TextGenerator>> {
    let spec = client_spec(config, |name| std::env::var(name).ok());
    debug!(provider = %spec.provider, model = %spec.model, "Resolved text-completion client");
    core.factory
        .text_generator(&spec)
        .with_context(|| format!("Failed to create {} client", spec.provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn environment_prefers_openai_then_anthropic() {
        let spec = client_spec(None, env(&[("ANTHROPIC_API_KEY", "a"), ("OPENAI_API_KEY", "o")]));
        assert_eq!(spec.provider, LlmProvider::OpenAI);
        assert_eq!(spec.api_key.as_deref(), Some("o"));

        let spec = client_spec(None, env(&[("ANTHROPIC_API_KEY", "a")]));
        assert_eq!(spec.provider, LlmProvider::Anthropic);
        assert_eq!(spec.model, default_model(LlmProvider::Anthropic));

        let spec = client_spec(None, env(&[("OPENAI_API_KEY", "  ")]));
        assert_eq!(spec.provider, LlmProvider::OpenAI);
        assert!(spec.api_key.is_none());
    }

    #[test]
    fn config_reads_its_own_key_variable() {
        let mut config = LlmConfig::new("team", LlmProvider::Anthropic, "claude-x");
        config.api_key_env = Some("TEAM_KEY".to_string());
        config.base_url = Some("https://proxy.internal".to_string());

        let spec = client_spec(Some(&config), env(&[("TEAM_KEY", "k"), ("ANTHROPIC_API_KEY", "other")]));
        assert_eq!(spec.api_key.as_deref(), Some("k"));
        assert_eq!(spec.model, "claude-x");
        assert_eq!(spec.base_url.as_deref(), Some("https://proxy.internal"));
    }
}
