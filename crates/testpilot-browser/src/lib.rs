//! Browser action layer for TestPilot.
//!
//! This crate provides one uniform way to drive a browser, whichever process
//! actually owns it:
//! - A remote MCP server reached over streamable HTTP or stdio (`mcp`)
//! - A local Chromium-family browser driven over CDP (`local`)
//! - A subprocess test runner used when no step-capable backend is available (`runner`)
//!
//! Orchestration code talks to the first two through [`ActionClient`] using
//! the logical action names in [`actions`]; each backend translates them.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod launch;
pub mod local;
pub mod mcp;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod output;
pub mod page_scripts;
pub mod runner;

pub use local::{LocalActionClient, LocalOptions};
pub use mcp::{McpActionClient, McpServerConfig, McpTransport, RemoteTool};
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockActionClient;
pub use output::ActionOutput;
pub use runner::{
    RunOutcome, RunRequest, RuntimeProbe, ScriptLanguage, SubprocessRunner, TestRunner,
};

/// Logical action names understood by every backend.
pub mod actions {
    pub const NAVIGATE: &str = "navigate";
    pub const CLICK: &str = "click";
    pub const FILL: &str = "fill";
    pub const PRESS: &str = "press";
    pub const WAIT_FOR_SELECTOR: &str = "wait_for_selector";
    pub const WAIT_FOR_LOAD_STATE: &str = "wait_for_load_state";
    pub const SCREENSHOT: &str = "screenshot";
    pub const SNAPSHOT: &str = "snapshot";
    pub const EVALUATE: &str = "evaluate";
    pub const NETWORK_REQUESTS: &str = "network_requests";
    pub const CONSOLE_MESSAGES: &str = "console_messages";
    pub const NAVIGATION_HISTORY: &str = "navigation_history";
    pub const CLOSE: &str = "close";
}

/// Default per-action timeouts, in milliseconds.
pub mod timeouts {
    pub const NAVIGATION_MS: u64 = 30_000;
    pub const LOCAL_CLICK_MS: u64 = 10_000;
    pub const REMOTE_CLICK_MS: u64 = 30_000;
    pub const FILL_MS: u64 = 10_000;
    pub const SELECTOR_WAIT_MS: u64 = 10_000;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Remote,
    Local,
    Mock,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::Mock => "mock",
        }
    }
}

/// A browser session that executes named actions.
///
/// One instance is owned by exactly one flow. `close` must be safe to call
/// repeatedly and before `initialize`.
#[async_trait]
pub trait ActionClient: Send {
    fn backend(&self) -> BackendKind;

    async fn initialize(&mut self) -> Result<()>;

    async fn call_action(&mut self, name: &str, args: Value) -> Result<ActionOutput>;

    async fn close(&mut self) -> Result<()>;
}

/// Ask the browser to close, then end the session. Failures are logged.
pub async fn shut_down(client: &mut dyn ActionClient) {
    if let Err(err) = client.call_action(actions::CLOSE, serde_json::json!({})).await {
        tracing::warn!(
            backend = client.backend().as_str(),
            error = %err,
            "Failed to close browser"
        );
    }
    close_quietly(client).await;
}

/// Close `client`, logging a failure instead of returning it.
pub async fn close_quietly(client: &mut dyn ActionClient) {
    if let Err(err) = client.close().await {
        tracing::warn!(
            backend = client.backend().as_str(),
            error = %err,
            "Failed to close browser session"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shut_down_closes_the_browser_before_the_session() {
        let handle = MockActionClient::new();
        let mut client = handle.clone();
        client.initialize().await.unwrap();

        shut_down(&mut client).await;

        assert_eq!(handle.call_names().await, vec![actions::CLOSE.to_string()]);
        assert_eq!(handle.close_calls().await, 1);
        assert!(!handle.is_open().await);
    }

    #[tokio::test]
    async fn shut_down_still_ends_the_session_when_close_fails() {
        let handle = MockActionClient::new();
        handle.fail_on(actions::CLOSE, 1, "browser already gone").await;
        let mut client = handle.clone();
        client.initialize().await.unwrap();

        shut_down(&mut client).await;

        assert_eq!(handle.close_calls().await, 1);
        assert!(!handle.is_open().await);
    }
}
