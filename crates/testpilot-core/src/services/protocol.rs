//! Protocol server config management.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use testpilot_browser::{McpServerConfig, McpTransport, RemoteTool};
use tracing::{info, warn};

use crate::AppCore;
use crate::models::ProtocolConfig;

pub async fn create_config(core: &Arc<AppCore>, config: ProtocolConfig) -> Result<ProtocolConfig> {
    validate(&config)?;
    core.storage
        .protocol_configs
        .save(&config)
        .context("Failed to save protocol config")?;
    info!(config_id = %config.id, name = %config.name, "Protocol config created");
    Ok(config)
}

pub async fn list_configs(core: &Arc<AppCore>) -> Result<Vec<ProtocolConfig>> {
    core.storage.protocol_configs.list()
}

pub async fn get_config(core: &Arc<AppCore>, id: &str) -> Result<ProtocolConfig> {
    core.storage.protocol_configs.require(id)
}

pub async fn delete_config(core: &Arc<AppCore>, id: &str) -> Result<()> {
    if !core.storage.protocol_configs.delete(id)? {
        bail!("Protocol config {} not found", id);
    }
    Ok(())
}

/// Connect to the server behind `id` and list its tools.
pub async fn test_connection(core: &Arc<AppCore>, id: &str) -> Result<Vec<RemoteTool>> {
    let config = core.storage.protocol_configs.require(id)?;
    let tools = core
        .factory
        .list_remote_tools(&config.to_server_config())
        .await
        .with_context(|| format!("Failed to connect to protocol server '{}'", config.name))?;
    info!(config_id = %config.id, tools = tools.len(), "Protocol server reachable");
    Ok(tools)
}

/// Server config for a phase request; a disabled config counts as none.
pub(crate) fn select_server(core: &AppCore, id: Option<&str>) -> Result<Option<McpServerConfig>> {
    let Some(id) = id else {
        return Ok(None);
    };
    let config = core.storage.protocol_configs.require(id)?;
    if !config.enabled {
        warn!(config_id = %config.id, "Protocol config is disabled, skipping remote tier");
        return Ok(None);
    }
    Ok(Some(config.to_server_config()))
}

fn validate(config: &ProtocolConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        bail!("Protocol config name must not be empty");
    }
    match config.transport {
        McpTransport::StreamableHttp if config.url.as_deref().is_none_or(|url| url.trim().is_empty()) => {
            bail!("Streamable HTTP protocol config requires a url")
        }
        McpTransport::Stdio if config.command.as_deref().is_none_or(|cmd| cmd.trim().is_empty()) => {
            bail!("Stdio protocol config requires a command")
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_requires_its_endpoint() {
        let config = ProtocolConfig::streamable_http("remote", "http://127.0.0.1:8006");
        assert!(validate(&config).is_ok());

        let mut missing_url = config.clone();
        missing_url.url = None;
        assert!(validate(&missing_url).is_err());

        let mut stdio = config.clone();
        stdio.transport = McpTransport::Stdio;
        assert!(validate(&stdio).is_err());
        stdio.command = Some("npx".to_string());
        assert!(validate(&stdio).is_ok());
    }
}
