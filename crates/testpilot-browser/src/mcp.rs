//! Remote backend: a browser-automation MCP server that owns the browser.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use rmcp::ServiceExt;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::output::ActionOutput;
use crate::{ActionClient, BackendKind, actions, timeouts};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8006";
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
const LOAD_SETTLE_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum McpTransport {
    #[default]
    StreamableHttp,
    Stdio,
}

impl McpTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamableHttp => "streamable_http",
            Self::Stdio => "stdio",
        }
    }
}

/// How to reach one MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
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
    /// Logical action name -> remote tool name overrides.
    #[serde(default)]
    pub tool_aliases: HashMap<String, String>,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl McpServerConfig {
    pub fn streamable_http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: McpTransport::StreamableHttp,
            url: Some(url.into()),
            command: None,
            args: Vec::new(),
            headers: HashMap::new(),
            tool_aliases: HashMap::new(),
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
        }
    }
}

fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}

/// A tool advertised by a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    pub description: Option<String>,
}

type ClientService = RunningService<RoleClient, ()>;

pub struct McpActionClient {
    config: McpServerConfig,
    service: Option<ClientService>,
    browser_closed: bool,
}

impl McpActionClient {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            service: None,
            browser_closed: false,
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    async fn connect(&self) -> Result<ClientService> {
        match self.config.transport {
            McpTransport::StreamableHttp => {
                let url = self
                    .config
                    .url
                    .clone()
                    .filter(|url| !url.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
                let mut transport_config = StreamableHttpClientTransportConfig::with_uri(url);
                if let Some(token) = bearer_token(&self.config.headers) {
                    transport_config = transport_config.auth_header(token);
                }
                for name in self.config.headers.keys() {
                    if !name.eq_ignore_ascii_case("authorization") {
                        warn!(server = %self.config.name, header = %name, "Ignoring unsupported MCP header");
                    }
                }
                let transport = StreamableHttpClientTransport::from_config(transport_config);
                ().serve(transport)
                    .await
                    .map_err(|e| anyhow!("MCP handshake with '{}' failed: {e}", self.config.name))
            }
            McpTransport::Stdio => {
                let program = self
                    .config
                    .command
                    .as_deref()
                    .filter(|cmd| !cmd.trim().is_empty())
                    .ok_or_else(|| {
                        anyhow!("MCP server '{}' has no command configured", self.config.name)
                    })?;
                let mut command = Command::new(program);
                command.args(&self.config.args).kill_on_drop(true);
                let transport = TokioChildProcess::new(command)
                    .with_context(|| format!("Failed to spawn MCP server '{program}'"))?;
                ().serve(transport)
                    .await
                    .map_err(|e| anyhow!("MCP handshake with '{}' failed: {e}", self.config.name))
            }
        }
    }

    fn service(&self) -> Result<&ClientService> {
        self.service
            .as_ref()
            .ok_or_else(|| anyhow!("MCP session '{}' is not initialized", self.config.name))
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.config.call_timeout_secs.max(1))
    }

    /// Invoke a server tool by its own name, bypassing translation.
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value> {
        let service = self.service()?;
        let params: CallToolRequestParams =
            serde_json::from_value(json!({ "name": tool, "arguments": arguments }))
                .context("Invalid tool call parameters")?;

        debug!(server = %self.config.name, tool, "Calling MCP tool");
        let result = tokio::time::timeout(self.call_timeout(), service.call_tool(params))
            .await
            .map_err(|_| {
                anyhow!(
                    "Tool '{tool}' timed out after {} seconds",
                    self.config.call_timeout_secs
                )
            })?
            .map_err(|e| anyhow!("Tool '{tool}' failed: {e}"))?;

        let raw = serde_json::to_value(&result)?;
        if raw.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            let message = match ActionOutput::extract(raw) {
                ActionOutput::Text(text) => text,
                ActionOutput::Mapping(map) => map
                    .get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| Value::Object(map).to_string()),
                ActionOutput::Empty => "no details".to_string(),
            };
            bail!("Tool '{tool}' reported an error: {message}");
        }
        Ok(raw)
    }

    /// Names and descriptions of every tool the server advertises.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>> {
        let service = self.service()?;
        let tools = tokio::time::timeout(self.call_timeout(), service.list_all_tools())
            .await
            .map_err(|_| anyhow!("Listing tools timed out"))?
            .map_err(|e| anyhow!("Listing tools failed: {e}"))?;

        let mut listed = Vec::with_capacity(tools.len());
        for tool in tools {
            let value = serde_json::to_value(&tool)?;
            listed.push(RemoteTool {
                name: value
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                description: value
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        Ok(listed)
    }
}

#[async_trait]
impl ActionClient for McpActionClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn initialize(&mut self) -> Result<()> {
        if self.service.is_some() {
            return Ok(());
        }
        let service = tokio::time::timeout(self.call_timeout(), self.connect())
            .await
            .map_err(|_| anyhow!("Connecting to MCP server '{}' timed out", self.config.name))??;
        info!(
            server = %self.config.name,
            transport = self.config.transport.as_str(),
            "MCP session established"
        );
        self.service = Some(service);
        self.browser_closed = false;
        Ok(())
    }

    async fn call_action(&mut self, name: &str, args: Value) -> Result<ActionOutput> {
        if name == actions::CLOSE {
            if self.service.is_some() && !self.browser_closed {
                let (tool, tool_args) = translate_action(name, &args, &self.config.tool_aliases);
                self.browser_closed = true;
                self.call_tool(&tool, tool_args).await?;
            }
            return Ok(ActionOutput::Empty);
        }

        let (tool, tool_args) = translate_action(name, &args, &self.config.tool_aliases);
        let raw = self.call_tool(&tool, tool_args).await?;

        if name == actions::WAIT_FOR_LOAD_STATE {
            tokio::time::sleep(Duration::from_millis(LOAD_SETTLE_MS)).await;
        }

        Ok(ActionOutput::extract(raw))
    }

    async fn close(&mut self) -> Result<()> {
        if self.service.is_none() {
            return Ok(());
        }
        // The server owns the browser; the session ending does not close it.
        if let Err(err) = self.call_action(actions::CLOSE, json!({})).await {
            warn!(server = %self.config.name, error = %err, "Remote browser did not close");
        }
        let Some(service) = self.service.take() else {
            return Ok(());
        };
        service
            .cancel()
            .await
            .map_err(|e| anyhow!("Failed to stop MCP session '{}': {e}", self.config.name))?;
        debug!(server = %self.config.name, "MCP session closed");
        Ok(())
    }
}

fn bearer_token(headers: &HashMap<String, String>) -> Option<String> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        .map(|(_, value)| {
            value
                .strip_prefix("Bearer ")
                .unwrap_or(value)
                .trim()
                .to_string()
        })
}

fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Map a logical action onto the server's tool name and argument shape.
///
/// Unknown names pass through unchanged so arbitrary server tools stay reachable.
pub fn translate_action(
    name: &str,
    args: &Value,
    aliases: &HashMap<String, String>,
) -> (String, Value) {
    let (tool, tool_args) = match name {
        actions::NAVIGATE => (
            "enhanced_navigate",
            json!({
                "url": str_arg(args, "url"),
                "wait_until": args
                    .get("wait_until")
                    .and_then(Value::as_str)
                    .unwrap_or("networkidle"),
            }),
        ),
        actions::CLICK => (
            "enhanced_click",
            json!({
                "selector": str_arg(args, "selector"),
                "timeout": args
                    .get("timeout")
                    .and_then(Value::as_u64)
                    .unwrap_or(timeouts::REMOTE_CLICK_MS),
            }),
        ),
        actions::FILL => (
            "enhanced_fill",
            json!({
                "selector": str_arg(args, "selector"),
                "value": str_arg(args, "value"),
            }),
        ),
        actions::PRESS => (
            "browser_evaluate",
            json!({ "script": key_dispatch_script(str_arg(args, "key")) }),
        ),
        actions::WAIT_FOR_SELECTOR => {
            let mut tool_args = json!({ "selector": str_arg(args, "selector") });
            if let Some(timeout) = args.get("timeout").and_then(Value::as_u64) {
                tool_args["timeout"] = json!(timeout);
            }
            ("browser_wait", tool_args)
        }
        actions::WAIT_FOR_LOAD_STATE => (
            "browser_evaluate",
            json!({ "script": "document.readyState" }),
        ),
        actions::SCREENSHOT => (
            "browser_screenshot_base64",
            json!({
                "full_page": args.get("full_page").and_then(Value::as_bool).unwrap_or(false),
                "quality": 60,
            }),
        ),
        actions::SNAPSHOT => (
            "call_playwright_tool",
            json!({ "tool_name": "browser_snapshot", "arguments": {} }),
        ),
        actions::EVALUATE => (
            "browser_evaluate",
            json!({ "script": str_arg(args, "script") }),
        ),
        actions::NETWORK_REQUESTS => (
            "enhanced_get_network_requests",
            json!({ "include_static": false }),
        ),
        actions::CONSOLE_MESSAGES => (
            "enhanced_get_console_logs",
            json!({ "level": "warning" }),
        ),
        actions::NAVIGATION_HISTORY => ("get_navigation_history", json!({})),
        actions::CLOSE => ("browser_close", json!({})),
        other => (other, args.clone()),
    };

    let tool = aliases
        .get(name)
        .cloned()
        .unwrap_or_else(|| tool.to_string());
    (tool, tool_args)
}

fn key_dispatch_script(key: &str) -> String {
    let key = if key.is_empty() { "Enter" } else { key };
    let literal = serde_json::to_string(key).unwrap_or_else(|_| "\"Enter\"".to_string());
    format!(
        "document.activeElement.dispatchEvent(new KeyboardEvent('keydown', {{key: {literal}}}))"
    )
}
