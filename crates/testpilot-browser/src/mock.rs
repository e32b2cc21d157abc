//! Scripted action client for tests that must not launch a browser.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::output::ActionOutput;
use crate::{ActionClient, BackendKind, actions};

/// A tiny but valid-looking base64 JPEG header, long enough to pass as a screenshot.
pub const MOCK_SCREENSHOT: &str = "/9j/4AAQSkZJRgABAQAAAQABAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/wAALCAABAAEBAREA";

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<(String, Value)>,
    counts: HashMap<String, usize>,
    failures: HashMap<(String, usize), String>,
    responses: HashMap<String, ActionOutput>,
    fail_initialize: Option<String>,
    initialized: bool,
    close_calls: usize,
}

/// Records every call; individual calls can be made to fail.
///
/// Clones share state, so a test can keep one handle while the code under
/// test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockActionClient {
    state: Arc<Mutex<MockState>>,
}

impl MockActionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `nth` (1-based) call of `action` with `message`.
    pub async fn fail_on(&self, action: &str, nth: usize, message: impl Into<String>) {
        self.state
            .lock()
            .await
            .failures
            .insert((action.to_string(), nth), message.into());
    }

    pub async fn fail_initialize(&self, message: impl Into<String>) {
        self.state.lock().await.fail_initialize = Some(message.into());
    }

    /// Answer every call of `action` with `output`.
    pub async fn respond(&self, action: &str, output: ActionOutput) {
        self.state
            .lock()
            .await
            .responses
            .insert(action.to_string(), output);
    }

    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_names(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub async fn close_calls(&self) -> usize {
        self.state.lock().await.close_calls
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.initialized
    }

    fn default_output(name: &str, args: &Value) -> ActionOutput {
        let mut map = Map::new();
        match name {
            actions::SCREENSHOT => {
                map.insert("screenshot".to_string(), json!(MOCK_SCREENSHOT));
            }
            actions::SNAPSHOT => {
                map.insert("title".to_string(), json!("Mock Page"));
                map.insert("url".to_string(), json!("https://example.com"));
                map.insert(
                    "links".to_string(),
                    json!([{"text": "About", "href": "https://example.com/about"}]),
                );
                map.insert(
                    "buttons".to_string(),
                    json!([{"text": "Sign in", "type": "submit"}]),
                );
                map.insert(
                    "inputs".to_string(),
                    json!([{"type": "text", "name": "q", "placeholder": "Search"}]),
                );
                map.insert("forms".to_string(), json!([]));
            }
            actions::NETWORK_REQUESTS => {
                map.insert("requests".to_string(), json!([]));
            }
            actions::CONSOLE_MESSAGES => {
                map.insert("messages".to_string(), json!([]));
            }
            actions::NAVIGATION_HISTORY => {
                map.insert("history".to_string(), json!([]));
            }
            _ => {
                map.insert("status".to_string(), json!("success"));
                if let Some(url) = args.get("url") {
                    map.insert("url".to_string(), url.clone());
                }
            }
        }
        ActionOutput::Mapping(map)
    }
}

#[async_trait]
impl ActionClient for MockActionClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Mock
    }

    async fn initialize(&mut self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_initialize.clone() {
            bail!(message);
        }
        state.initialized = true;
        Ok(())
    }

    async fn call_action(&mut self, name: &str, args: Value) -> Result<ActionOutput> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            bail!("Mock session is not initialized");
        }
        state.calls.push((name.to_string(), args.clone()));
        let count = {
            let entry = state.counts.entry(name.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        if let Some(message) = state.failures.get(&(name.to_string(), count)) {
            return Err(anyhow!(message.clone()));
        }
        if name == actions::CLOSE {
            state.initialized = false;
            return Ok(ActionOutput::Empty);
        }
        Ok(state
            .responses
            .get(name)
            .cloned()
            .unwrap_or_else(|| Self::default_output(name, &args)))
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.close_calls += 1;
        state.initialized = false;
        Ok(())
    }
}
