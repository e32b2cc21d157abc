//! Execution engine: replay extracted steps through a browser, or hand the
//! script to the test runner when no step-capable backend works.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, bail};
use chrono::{Local, Utc};
use serde_json::json;
use testpilot_browser::{
    ActionClient, LocalOptions, McpServerConfig, RunRequest, actions, close_quietly, shut_down, timeouts,
};
use tracing::{debug, error, info, warn};

use crate::backend::BackendFactory;
use crate::cascade::{ExecuteTier, run_cascade};
use crate::models::{Execution, ExecutionStatus, GeneratedCode, StepRecord, StepStatus};
use crate::steps::{Step, StepAction, extract_steps};

const RUN_TIMEOUT_SECS: u64 = 300;
const LOCAL_BROWSERS: [&str; 4] = ["chromium", "chrome", "msedge", "edge"];

/// Result of the tier that ran the script.
#[derive(Debug, Clone)]
struct TierRun {
    status: ExecutionStatus,
    steps: Vec<StepRecord>,
    stdout: String,
    stderr: String,
    exit_code: i32,
    error_message: Option<String>,
}

pub struct ExecutionEngine {
    factory: Arc<dyn BackendFactory>,
}

impl ExecutionEngine {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self { factory }
    }

    /// Run `code` and record the outcome on `execution`, which ends terminal.
    pub async fn execute(&self, code: &GeneratedCode, execution: &mut Execution, protocol: Option<&McpServerConfig>) {
        info!(
            execution_id = %execution.id,
            code_id = %code.id,
            browser = %execution.browser,
            headless = execution.headless,
            "Executing test code"
        );

        let steps = extract_steps(&code.code);
        let tiers = ExecuteTier::chain(protocol.is_some());
        let browser = execution.browser.clone();
        let headless = execution.headless;
        let steps = steps.as_slice();

        let outcome = run_cascade("execute", &tiers, |tier| {
            let browser = browser.clone();
            async move {
                match (tier, protocol) {
                    (ExecuteTier::Remote, Some(config)) => {
                        let steps = step_plan(steps)?;
                        self.run_on(self.factory.remote(config), steps, timeouts::REMOTE_CLICK_MS)
                            .await
                    }
                    (ExecuteTier::Remote, None) => bail!("No protocol server configured"),
                    (ExecuteTier::Local, _) => {
                        let steps = step_plan(steps)?;
                        if !LOCAL_BROWSERS.contains(&browser.to_lowercase().as_str()) {
                            bail!("Local backend only drives Chromium-family browsers, not '{browser}'");
                        }
                        let options = LocalOptions {
                            headless,
                            ..LocalOptions::default()
                        };
                        self.run_on(self.factory.local(options), steps, timeouts::LOCAL_CLICK_MS)
                            .await
                    }
                    (ExecuteTier::Subprocess, _) => self.run_subprocess(code, &browser, headless).await,
                }
            }
        })
        .await;

        match outcome {
            Ok((run, tier)) => {
                execution.backend = Some(tier.as_str().to_string());
                execution.screenshots = run.steps;
                execution.stdout = run.stdout;
                execution.stderr = run.stderr;
                execution.exit_code = Some(run.exit_code);
                execution.error_message = run.error_message;
                execution.finish(run.status);
            }
            Err(err) => {
                error!(execution_id = %execution.id, error = %err, "Execution failed on every backend");
                execution.error_message = Some(format!("{err:#}"));
                execution.stderr = format!("{err:#}");
                execution.exit_code = Some(1);
                execution.finish(ExecutionStatus::Failed);
            }
        }

        info!(
            execution_id = %execution.id,
            status = execution.status.as_str(),
            backend = execution.backend.as_deref().unwrap_or("none"),
            steps = execution.screenshots.len(),
            duration = execution.duration.unwrap_or_default(),
            "Execution finished"
        );
    }

    /// One step-capable session, always closed before returning.
    async fn run_on(&self, mut client: Box<dyn ActionClient>, steps: &[Step], click_timeout_ms: u64) -> Result<TierRun> {
        if let Err(err) = client.initialize().await {
            close_quietly(client.as_mut()).await;
            return Err(err);
        }
        let run = drive_steps(client.as_mut(), steps, click_timeout_ms).await;
        shut_down(client.as_mut()).await;
        Ok(run)
    }

    async fn run_subprocess(&self, code: &GeneratedCode, browser: &str, headless: bool) -> Result<TierRun> {
        let request = RunRequest {
            code: code.code.clone(),
            language: code.language,
            browser: browser.to_string(),
            headless,
            timeout_secs: RUN_TIMEOUT_SECS,
        };
        let outcome = self.factory.runner().run(&request).await?;
        let status = if outcome.succeeded() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        let error_message = (!outcome.succeeded()).then(|| outcome.stderr.clone());
        Ok(TierRun {
            status,
            steps: Vec::new(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: outcome.exit_code,
            error_message,
        })
    }
}

/// Steps worth replaying; a lone `execute` step belongs to the test runner.
fn step_plan(steps: &[Step]) -> Result<&[Step]> {
    if steps.iter().all(|step| step.action == StepAction::Execute) {
        bail!("No browser actions recognized in the script");
    }
    Ok(steps)
}

fn clock() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Replay `steps` in order, stopping at the first failed action.
async fn drive_steps(client: &mut dyn ActionClient, steps: &[Step], click_timeout_ms: u64) -> TierRun {
    let mut records = Vec::with_capacity(steps.len());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut status = ExecutionStatus::Success;

    for step in steps {
        let started = Instant::now();
        stdout.push(format!("[{}] step {}: {}", clock(), step.step_number, step.description));

        let opens_page = step.step_number == 1 && matches!(step.action, StepAction::Navigate { .. });
        let screenshot_before = if opens_page { None } else { capture(client).await };

        match dispatch(client, &step.action, click_timeout_ms).await {
            Ok(()) => {
                let screenshot_after = capture(client).await;
                let duration = started.elapsed().as_secs_f64();
                stdout.push(format!("[{}] step {} done ({duration:.2}s)", clock(), step.step_number));
                records.push(StepRecord {
                    step_number: step.step_number,
                    action: step.action.tag().to_string(),
                    description: step.description.clone(),
                    screenshot_before,
                    screenshot_after,
                    status: StepStatus::Success,
                    duration,
                    timestamp: Utc::now().to_rfc3339(),
                    error_message: None,
                });
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(step = step.step_number, action = step.action.tag(), error = %message, "Step failed");
                let screenshot_after = capture(client).await;
                stderr.push(format!("[{}] step {} failed: {message}", clock(), step.step_number));
                records.push(StepRecord {
                    step_number: step.step_number,
                    action: step.action.tag().to_string(),
                    description: step.description.clone(),
                    screenshot_before,
                    screenshot_after,
                    status: StepStatus::Failed,
                    duration: started.elapsed().as_secs_f64(),
                    timestamp: Utc::now().to_rfc3339(),
                    error_message: Some(message),
                });
                status = ExecutionStatus::Failed;
                break;
            }
        }
    }

    let failed = status == ExecutionStatus::Failed;
    TierRun {
        status,
        steps: records,
        stdout: stdout.join("\n"),
        error_message: failed.then(|| stderr.join("\n")),
        stderr: stderr.join("\n"),
        exit_code: i32::from(failed),
    }
}

async fn dispatch(client: &mut dyn ActionClient, action: &StepAction, click_timeout_ms: u64) -> Result<()> {
    let (name, args) = match action {
        StepAction::Navigate { url } => (
            actions::NAVIGATE,
            json!({ "url": url, "wait_until": "load", "timeout": timeouts::NAVIGATION_MS }),
        ),
        StepAction::Type { selector, text } => (
            actions::FILL,
            json!({ "selector": selector, "value": text }),
        ),
        StepAction::Click { selector } => (
            actions::CLICK,
            json!({ "selector": selector, "timeout": click_timeout_ms }),
        ),
        StepAction::Press { key, selector } => {
            let mut args = json!({ "key": key });
            if let Some(selector) = selector {
                args["selector"] = json!(selector);
            }
            (actions::PRESS, args)
        }
        StepAction::WaitLoad { state } => (actions::WAIT_FOR_LOAD_STATE, json!({ "state": state })),
        StepAction::Wait { selector } => (
            actions::WAIT_FOR_SELECTOR,
            json!({ "selector": selector, "timeout": timeouts::SELECTOR_WAIT_MS }),
        ),
        StepAction::Execute => bail!("Execute steps can only run through the test runner"),
    };
    debug!(action = name, "Dispatching step");
    client.call_action(name, args).await?;
    Ok(())
}

/// Best-effort screenshot; `None` when the backend returns nothing usable.
async fn capture(client: &mut dyn ActionClient) -> Option<String> {
    match client.call_action(actions::SCREENSHOT, json!({ "full_page": false })).await {
        Ok(output) => Some(output.screenshot()).filter(|image| !image.is_empty()),
        Err(err) => {
            warn!(error = %err, "Screenshot failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testpilot_browser::MockActionClient;

    const FIVE_STEPS: &str = r#"import { test, expect } from '@playwright/test';
test('search', async ({ page }) => {
  await page.goto('https://example.com');
  await page.fill('#q', 'rust');
  await page.click('#go');
  await page.press('#q', 'Enter');
  await page.waitForSelector('.results');
});"#;

    async fn open(mock: &MockActionClient) -> MockActionClient {
        let mut client = mock.clone();
        client.initialize().await.unwrap();
        client
    }

    #[tokio::test]
    async fn stops_at_first_failed_step() {
        let mock = MockActionClient::new();
        mock.fail_on(actions::CLICK, 1, "element #go not found").await;
        let mut client = open(&mock).await;

        let run = drive_steps(&mut client, &extract_steps(FIVE_STEPS), timeouts::LOCAL_CLICK_MS).await;

        assert_eq!(run.status, ExecutionStatus::Failed);
        assert_eq!(run.steps.len(), 3);
        let numbers: Vec<usize> = run.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(run.steps[2].status, StepStatus::Failed);
        assert!(run.steps[2].error_message.as_deref().unwrap().contains("#go"));
        assert_eq!(run.exit_code, 1);
        assert!(run.error_message.unwrap().contains("step 3 failed"));

        let names = mock.call_names().await;
        assert!(!names.iter().any(|name| name == actions::PRESS));
        assert!(!names.iter().any(|name| name == actions::WAIT_FOR_SELECTOR));
    }

    #[tokio::test]
    async fn first_navigation_skips_before_screenshot() {
        let mock = MockActionClient::new();
        let mut client = open(&mock).await;

        let run = drive_steps(&mut client, &extract_steps(FIVE_STEPS), timeouts::LOCAL_CLICK_MS).await;

        assert_eq!(run.status, ExecutionStatus::Success);
        assert_eq!(run.exit_code, 0);
        assert!(run.error_message.is_none());
        assert!(run.steps[0].screenshot_before.is_none());
        assert!(run.steps[0].screenshot_after.is_some());
        assert!(run.steps[1].screenshot_before.is_some());
        assert_eq!(run.stdout.lines().count(), 10);

        let calls = mock.calls().await;
        let (name, args) = &calls[0];
        assert_eq!(name, actions::NAVIGATE);
        assert_eq!(args["wait_until"], "load");
        assert_eq!(args["timeout"], timeouts::NAVIGATION_MS);
        let fill = calls.iter().find(|(name, _)| name == actions::FILL).unwrap();
        assert_eq!(fill.1["value"], "rust");
        let press = calls.iter().find(|(name, _)| name == actions::PRESS).unwrap();
        assert_eq!(press.1["key"], "Enter");
        assert_eq!(press.1["selector"], "#q");
    }

    #[tokio::test]
    async fn screenshot_failures_do_not_fail_steps() {
        let mock = MockActionClient::new();
        mock.fail_on(actions::SCREENSHOT, 1, "capture failed").await;
        let mut client = open(&mock).await;

        let steps = extract_steps("page.goto('https://example.com')");
        let run = drive_steps(&mut client, &steps, timeouts::LOCAL_CLICK_MS).await;

        assert_eq!(run.status, ExecutionStatus::Success);
        assert!(run.steps[0].screenshot_after.is_none());
    }

    #[test]
    fn execute_only_scripts_defer_to_the_runner() {
        let steps = extract_steps("// nothing recognizable\nconsole.log('hi');");
        assert!(step_plan(&steps).is_err());
        assert!(step_plan(&extract_steps("page.goto('https://example.com')")).is_ok());
    }
}
