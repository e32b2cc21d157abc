//! Construction seam for browser sessions, the test runner and LLM clients.
//!
//! Agents never build backends themselves; they ask a [`BackendFactory`], so
//! tests can substitute scripted clients for every external process.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use testpilot_ai::{
    ChatTextGenerator, ClientSpec, DefaultLlmClientFactory, LlmClientFactory, TextGenerator,
};
use testpilot_browser::{
    ActionClient, LocalActionClient, LocalOptions, McpActionClient, McpServerConfig, RemoteTool,
    SubprocessRunner, TestRunner,
};

#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// A session against a remote protocol server. Not yet connected.
    fn remote(&self, config: &McpServerConfig) -> Box<dyn ActionClient>;

    /// A local browser session. Not yet launched.
    fn local(&self, options: LocalOptions) -> Box<dyn ActionClient>;

    fn runner(&self) -> Arc<dyn TestRunner>;

    fn text_generator(&self, spec: &ClientSpec) -> Result<Arc<dyn TextGenerator>>;

    /// Connect to a protocol server and list the tools it advertises.
    async fn list_remote_tools(&self, config: &McpServerConfig) -> Result<Vec<RemoteTool>>;
}

/// Real backends: MCP over rmcp, Chromium over CDP, subprocess runner, HTTP LLM clients.
pub struct DefaultBackendFactory {
    llm_factory: DefaultLlmClientFactory,
    runner: Arc<SubprocessRunner>,
}

impl DefaultBackendFactory {
    pub fn new() -> Self {
        Self {
            llm_factory: DefaultLlmClientFactory::default(),
            runner: Arc::new(SubprocessRunner::new()),
        }
    }
}

impl Default for DefaultBackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendFactory for DefaultBackendFactory {
    fn remote(&self, config: &McpServerConfig) -> Box<dyn ActionClient> {
        Box::new(McpActionClient::new(config.clone()))
    }

    fn local(&self, options: LocalOptions) -> Box<dyn ActionClient> {
        Box::new(LocalActionClient::new(options))
    }

    fn runner(&self) -> Arc<dyn TestRunner> {
        self.runner.clone()
    }

    fn text_generator(&self, spec: &ClientSpec) -> Result<Arc<dyn TextGenerator>> {
        let client = self.llm_factory.create_client(spec)?;
        Ok(Arc::new(ChatTextGenerator::new(client)))
    }

    async fn list_remote_tools(&self, config: &McpServerConfig) -> Result<Vec<RemoteTool>> {
        let mut client = McpActionClient::new(config.clone());
        client.initialize().await?;
        let tools = client.list_tools().await;
        testpilot_browser::close_quietly(&mut client).await;
        tools
    }
}
