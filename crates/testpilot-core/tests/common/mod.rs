#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;
use testpilot_ai::{ChatTextGenerator, ClientSpec, MockLlmClient, MockStep, TextGenerator};
use testpilot_browser::{
    ActionClient, LocalOptions, McpServerConfig, MockActionClient, RemoteTool, RunOutcome,
    RunRequest, RuntimeProbe, TestRunner,
};
use testpilot_core::{AppCore, BackendFactory};
use tokio::sync::Mutex;

/// Runner that records requests and answers with a fixed outcome.
pub struct ScriptedRunner {
    outcome: RunOutcome,
    requests: Mutex<Vec<RunRequest>>,
}

impl ScriptedRunner {
    pub fn exiting(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            outcome: RunOutcome {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                duration_ms: 1200,
                command: "npx playwright test".to_string(),
            },
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TestRunner for ScriptedRunner {
    async fn probe(&self) -> Result<RuntimeProbe> {
        Ok(RuntimeProbe {
            node_available: true,
            node_version: Some("v22.0.0".to_string()),
            npx_available: true,
            ready: true,
            ..RuntimeProbe::default()
        })
    }

    async fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        self.requests.lock().await.push(request.clone());
        Ok(self.outcome.clone())
    }
}

/// Every backend scripted; clones of the mock clients share state with the handles here.
pub struct MockFactory {
    pub remote: MockActionClient,
    pub local: MockActionClient,
    pub llm: Arc<MockLlmClient>,
    pub runner: Arc<ScriptedRunner>,
    pub tools: Vec<RemoteTool>,
}

impl MockFactory {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            remote: MockActionClient::new(),
            local: MockActionClient::new(),
            llm: Arc::new(MockLlmClient::from_steps("mock-model", steps)),
            runner: Arc::new(ScriptedRunner::exiting(0, "1 passed", "")),
            tools: vec![RemoteTool {
                name: "navigate".to_string(),
                description: Some("Open a URL".to_string()),
            }],
        }
    }
}

#[async_trait]
impl BackendFactory for MockFactory {
    fn remote(&self, _config: &McpServerConfig) -> Box<dyn ActionClient> {
        Box::new(self.remote.clone())
    }

    fn local(&self, _options: LocalOptions) -> Box<dyn ActionClient> {
        Box::new(self.local.clone())
    }

    fn runner(&self) -> Arc<dyn TestRunner> {
        self.runner.clone()
    }

    fn text_generator(&self, _spec: &ClientSpec) -> Result<Arc<dyn TextGenerator>> {
        Ok(Arc::new(ChatTextGenerator::new(self.llm.clone())))
    }

    async fn list_remote_tools(&self, _config: &McpServerConfig) -> Result<Vec<RemoteTool>> {
        Ok(self.tools.clone())
    }
}

/// A core over a fresh database. Keep the `TempDir` alive for the test.
pub fn core_with(factory: Arc<MockFactory>) -> (Arc<AppCore>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let core = AppCore::with_factory(temp_dir.path().join("testpilot.db"), factory).unwrap();
    (Arc::new(core), temp_dir)
}

pub const SCENARIOS_JSON: &str = r#"Here is the plan:
{
  "test_scenarios": [
    {
      "name": "Home page loads",
      "description": "The landing page renders its heading",
      "priority": "high",
      "steps": ["Open the home page", "Check the heading"],
      "expected_result": "Heading is visible",
      "assumptions": ["Fresh browser state"]
    },
    {
      "name": "More information link",
      "description": "The only link leads to IANA",
      "priority": "low",
      "steps": ["Click the link"],
      "expected_result": "IANA page opens"
    }
  ]
}"#;

pub const NAVIGATE_ONLY_PY: &str = "```python\nimport re\nfrom playwright.sync_api import Page, expect\n\n\ndef test_home_page_loads(page: Page):\n    page.goto(\"https://example.com\")\n    expect(page).to_have_title(re.compile(\"Example\"))\n```\n\n```json\n{\"base_url\": \"https://example.com\"}\n```";

pub const CLICKING_TS: &str = "```typescript\nimport { test, expect } from '@playwright/test';\n\ntest('more info', async ({ page }) => {\n  await page.goto('https://example.com');\n  await page.click('#more-info');\n});\n```";

pub const FIXED_TS: &str = "```typescript\nimport { test, expect } from '@playwright/test';\n\ntest('more info', async ({ page }) => {\n  await page.goto('https://example.com');\n  await page.waitForSelector('a');\n  await page.locator('a').click();\n});\n```";
