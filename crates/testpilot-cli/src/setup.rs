//! CLI setup module
//!
//! Opens the embedded TestPilot core and seeds defaults from the config file.

use anyhow::Result;
use std::str::FromStr;
use std::sync::Arc;
use testpilot_ai::LlmProvider;
use testpilot_core::models::{LlmConfig, ProtocolConfig, default_model};
use testpilot_core::{AppCore, paths};
use tracing::info;

use crate::config::CliConfig;

/// Name of the protocol config seeded from `default.protocol_url`.
pub const DEFAULT_PROTOCOL_NAME: &str = "default";

/// Build the embedded TestPilot core
pub async fn prepare_core(db_path: Option<String>, config: &CliConfig) -> Result<Arc<AppCore>> {
    let db_path = match db_path.or_else(|| config.default.db_path.clone()) {
        Some(path) => path,
        None => paths::database_path()?.display().to_string(),
    };
    let core = AppCore::new(&db_path).await?;
    ensure_default_llm_config(&core, config)?;
    ensure_default_protocol(&core, config)?;
    Ok(Arc::new(core))
}

/// Create the default LLM config from `[llm]` if no config is flagged default.
fn ensure_default_llm_config(core: &AppCore, config: &CliConfig) -> Result<()> {
    let Some(provider) = config.llm.provider.as_deref() else {
        return Ok(());
    };
    if core.storage.llm_configs.find_default()?.is_some() {
        return Ok(());
    }
    let provider = LlmProvider::from_str(provider)?;
    let model = config
        .llm
        .model
        .clone()
        .unwrap_or_else(|| default_model(provider).to_string());
    let mut llm = LlmConfig::new("default", provider, model);
    llm.base_url = config.llm.base_url.clone();
    llm.is_default = true;
    core.storage.llm_configs.save(&llm)?;
    info!(provider = %provider, "Seeded default LLM config from config file");
    Ok(())
}

fn ensure_default_protocol(core: &AppCore, config: &CliConfig) -> Result<()> {
    let Some(url) = config.default.protocol_url.as_deref() else {
        return Ok(());
    };
    let exists = core
        .storage
        .protocol_configs
        .list()?
        .iter()
        .any(|server| server.name == DEFAULT_PROTOCOL_NAME);
    if !exists {
        core.storage
            .protocol_configs
            .save(&ProtocolConfig::streamable_http(DEFAULT_PROTOCOL_NAME, url))?;
        info!(url, "Seeded default protocol server from config file");
    }
    Ok(())
}
