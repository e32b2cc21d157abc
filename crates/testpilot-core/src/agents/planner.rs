//! Explorer / planner: observe the target page, then ask the model for scenarios.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value, json};
use testpilot_ai::TextGenerator;
use testpilot_browser::{ActionClient, LocalOptions, McpServerConfig, actions, shut_down, timeouts};
use tracing::{error, info, warn};

use super::completion::{complete, reject_error_envelope};
use super::prompts;
use crate::backend::BackendFactory;
use crate::cascade::{ExploreTier, run_cascade};
use crate::models::{
    DEFAULT_SEED_FILE, ElementCounts, ExplorationMethod, ExplorationResult, ExplorationStep,
    PlanStatus, Priority, Scenario, TestPlan,
};

const PLAN_TEMPERATURE: f32 = 0.7;
const PLAN_MAX_TOKENS: u32 = 4000;
const NETWORK_EXCERPT: usize = 10;
const CONSOLE_EXCERPT: usize = 20;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("Invalid regex"));

/// What one exploration tier saw.
#[derive(Debug, Clone)]
struct Observation {
    method: ExplorationMethod,
    snapshot: Value,
    steps: Vec<ExplorationStep>,
}

pub struct Planner {
    factory: Arc<dyn BackendFactory>,
    generator: Arc<dyn TextGenerator>,
}

impl Planner {
    pub fn new(factory: Arc<dyn BackendFactory>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { factory, generator }
    }

    /// Drive `plan` from `exploring` to `completed` or `failed`.
    pub async fn explore(&self, plan: &mut TestPlan, protocol: Option<&McpServerConfig>) {
        info!(plan_id = %plan.id, url = %plan.url, "Exploring target");

        match self.observe_and_plan(plan, protocol).await {
            Ok((scenarios, exploration)) => {
                info!(
                    plan_id = %plan.id,
                    method = exploration.method.as_str(),
                    scenarios = scenarios.len(),
                    "Exploration completed"
                );
                plan.test_scenarios = scenarios;
                plan.exploration_result = Some(exploration);
                plan.status = PlanStatus::Completed;
                plan.error_message = None;
            }
            Err(err) => {
                error!(plan_id = %plan.id, error = %err, "Exploration failed");
                plan.status = PlanStatus::Failed;
                plan.error_message = Some(format!("{err:#}"));
            }
        }
        plan.updated_at = Utc::now();
    }

    async fn observe_and_plan(
        &self,
        plan: &TestPlan,
        protocol: Option<&McpServerConfig>,
    ) -> Result<(Vec<Scenario>, ExplorationResult)> {
        let budget = Duration::from_secs(plan.timeout_secs.max(1));
        let tiers = ExploreTier::chain(protocol.is_some());

        let (observation, _) = run_cascade("explore", &tiers, |tier| async move {
            match (tier, protocol) {
                (ExploreTier::Remote, Some(config)) => self.explore_remote(config, &plan.url, budget).await,
                (ExploreTier::Remote, None) => Err(anyhow!("No protocol server configured")),
                (ExploreTier::Local, _) => self.explore_local(&plan.url, budget).await,
                (ExploreTier::Inference, _) => Ok(Observation {
                    method: ExplorationMethod::LlmInference,
                    snapshot: json!({}),
                    steps: Vec::new(),
                }),
            }
        })
        .await?;

        let mut for_prompt = observation.snapshot.clone();
        if let Some(map) = for_prompt.as_object_mut() {
            map.remove("screenshot");
        }
        let prompt = prompts::exploration(
            &plan.url,
            plan.max_depth,
            plan.requirements.as_deref(),
            &for_prompt,
        );
        let response = complete(
            self.generator.as_ref(),
            "test planning",
            &prompt,
            PLAN_TEMPERATURE,
            PLAN_MAX_TOKENS,
        )
        .await?;

        let scenarios = parse_scenarios(&response);
        let exploration = ExplorationResult {
            method: observation.method,
            snapshot: observation.snapshot,
            steps: observation.steps,
            plan_content: render_plan(&plan.url, &scenarios),
            total_scenarios: scenarios.len(),
            explored_at: Utc::now(),
        };
        Ok((scenarios, exploration))
    }

    async fn explore_remote(&self, config: &McpServerConfig, url: &str, budget: Duration) -> Result<Observation> {
        let mut client = self.factory.remote(config);
        let result = tokio::time::timeout(budget, remote_session(client.as_mut(), url))
            .await
            .unwrap_or_else(|_| Err(anyhow!("Remote exploration timed out after {}s", budget.as_secs())));
        shut_down(client.as_mut()).await;
        result
    }

    async fn explore_local(&self, url: &str, budget: Duration) -> Result<Observation> {
        let mut client = self.factory.local(LocalOptions::default());
        let result = tokio::time::timeout(budget, local_session(client.as_mut(), url))
            .await
            .unwrap_or_else(|_| Err(anyhow!("Local exploration timed out after {}s", budget.as_secs())));
        shut_down(client.as_mut()).await;
        result
    }
}

async fn remote_session(client: &mut dyn ActionClient, url: &str) -> Result<Observation> {
    client
        .initialize()
        .await
        .context("Failed to open protocol session")?;
    client
        .call_action(actions::NAVIGATE, json!({ "url": url, "wait_until": "networkidle" }))
        .await
        .with_context(|| format!("Failed to navigate to {url}"))?;

    let mut snapshot = into_object(client.call_action(actions::SNAPSHOT, json!({})).await?.into_value());

    let screenshot = client
        .call_action(actions::SCREENSHOT, json!({ "full_page": false }))
        .await?
        .screenshot();
    if !screenshot.is_empty() {
        snapshot.insert("screenshot".to_string(), Value::String(screenshot));
    }

    let network = probe_list(client, actions::NETWORK_REQUESTS, "requests").await;
    let console = probe_list(client, actions::CONSOLE_MESSAGES, "messages").await;
    let history = probe_list(client, actions::NAVIGATION_HISTORY, "history").await;

    let step = ExplorationStep {
        step_number: 1,
        action: "enhanced_explore".to_string(),
        description: format!("Explored {url} through the protocol server"),
        url: text_field(&snapshot, "url").unwrap_or(url).to_string(),
        page_title: text_field(&snapshot, "title").unwrap_or_default().to_string(),
        elements_found: element_counts(&snapshot),
        network_requests_count: network.len(),
        console_logs_count: console.len(),
        history_entries_count: history.len(),
        status: "success".to_string(),
    };

    snapshot.insert(
        "network_requests".to_string(),
        Value::Array(network.into_iter().take(NETWORK_EXCERPT).collect()),
    );
    snapshot.insert(
        "console_messages".to_string(),
        Value::Array(console.into_iter().take(CONSOLE_EXCERPT).collect()),
    );
    snapshot.insert("navigation_history".to_string(), Value::Array(history));

    Ok(Observation {
        method: ExplorationMethod::McpServer,
        snapshot: Value::Object(snapshot),
        steps: vec![step],
    })
}

async fn local_session(client: &mut dyn ActionClient, url: &str) -> Result<Observation> {
    client.initialize().await?;
    client
        .call_action(
            actions::NAVIGATE,
            json!({ "url": url, "wait_until": "networkidle", "timeout": timeouts::NAVIGATION_MS }),
        )
        .await
        .with_context(|| format!("Failed to navigate to {url}"))?;
    let snapshot = into_object(client.call_action(actions::SNAPSHOT, json!({})).await?.into_value());

    let step = ExplorationStep {
        step_number: 1,
        action: "local_explore".to_string(),
        description: format!("Explored {url} in a local browser"),
        url: text_field(&snapshot, "url").unwrap_or(url).to_string(),
        page_title: text_field(&snapshot, "title").unwrap_or_default().to_string(),
        elements_found: element_counts(&snapshot),
        network_requests_count: 0,
        console_logs_count: 0,
        history_entries_count: 0,
        status: "success".to_string(),
    };

    Ok(Observation {
        method: ExplorationMethod::LocalBrowser,
        snapshot: Value::Object(snapshot),
        steps: vec![step],
    })
}

/// Optional telemetry: a failure is logged and yields nothing.
async fn probe_list(client: &mut dyn ActionClient, action: &str, key: &str) -> Vec<Value> {
    match client.call_action(action, json!({})).await {
        Ok(output) => output.list(key),
        Err(err) => {
            warn!(action, error = %err, "Exploration probe failed");
            Vec::new()
        }
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("content".to_string(), other);
            map
        }
    }
}

fn text_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn element_counts(snapshot: &Map<String, Value>) -> ElementCounts {
    let count = |key: &str| snapshot.get(key).and_then(Value::as_array).map_or(0, Vec::len);
    ElementCounts {
        links: count("links"),
        buttons: count("buttons"),
        inputs: count("inputs"),
    }
}

/// Scenarios from a model response; the built-in set when nothing parses.
pub fn parse_scenarios(response: &str) -> Vec<Scenario> {
    if let Err(err) = reject_error_envelope(response) {
        warn!(error = %err, "Planning response is an error envelope, using default scenarios");
        return default_scenarios();
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(response.trim()) {
        return scenarios_from(&value);
    }

    if let Some(found) = JSON_OBJECT.find(response)
        && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(found.as_str())
    {
        return scenarios_from(&value);
    }

    warn!("Could not parse planning response, using default scenarios");
    default_scenarios()
}

fn scenarios_from(value: &Value) -> Vec<Scenario> {
    value
        .get("test_scenarios")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .map(Scenario::from_value)
                .collect()
        })
        .unwrap_or_default()
}

fn scenario(name: &str, description: &str, priority: Priority, steps: [&str; 3], expected: &str) -> Scenario {
    Scenario {
        name: name.to_string(),
        description: description.to_string(),
        priority,
        seed_file: Some(DEFAULT_SEED_FILE.to_string()),
        steps: steps.iter().map(|step| step.to_string()).collect(),
        expected_result: expected.to_string(),
        assumptions: Vec::new(),
    }
}

/// The fixed fallback set: page load, navigation, form submission.
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "Page load test",
            "Verify that the page loads correctly",
            Priority::High,
            ["Open the home page", "Wait for the page to load", "Verify the page title and main elements"],
            "Page loads and main elements are visible",
        ),
        scenario(
            "Navigation test",
            "Verify that site navigation works",
            Priority::Medium,
            ["Click the navigation menu", "Verify the page changes", "Check that the URL changed"],
            "Navigation works and the target page is shown",
        ),
        scenario(
            "Form submission test",
            "Verify that form submission works",
            Priority::High,
            ["Fill in the form fields", "Click the submit button", "Verify the submission result"],
            "Form submits successfully",
        ),
    ]
}

/// Markdown report of a plan's scenarios.
pub fn render_plan(url: &str, scenarios: &[Scenario]) -> String {
    let mut content = format!(
        "# Test Plan\n\n**URL:** {url}\n**Generated:** {}\n\n## Test Scenarios\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    );

    for (idx, scenario) in scenarios.iter().enumerate() {
        content.push_str(&format!("### {}. {}\n\n", idx + 1, scenario.name));
        content.push_str(&format!("**Description:** {}\n", scenario.description));
        content.push_str(&format!("**Priority:** {}\n", scenario.priority.as_str()));
        content.push_str(&format!(
            "**Seed file:** {}\n\n**Steps:**\n",
            scenario.seed_file.as_deref().unwrap_or(DEFAULT_SEED_FILE)
        ));
        for (step_idx, step) in scenario.steps.iter().enumerate() {
            content.push_str(&format!("{}. {}\n", step_idx + 1, step));
        }
        content.push_str(&format!("\n**Expected result:** {}\n\n", scenario.expected_result));

        if !scenario.assumptions.is_empty() {
            content.push_str("**Assumptions:**\n");
            for assumption in &scenario.assumptions {
                content.push_str(&format!("- {assumption}\n"));
            }
            content.push('\n');
        }
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_json_response_yields_default_set() {
        let scenarios = parse_scenarios("I could not produce JSON, sorry.");
        let names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Page load test", "Navigation test", "Form submission test"]);
        let priorities: Vec<Priority> = scenarios.iter().map(|s| s.priority).collect();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::High]);
    }

    #[test]
    fn embedded_json_is_located() {
        let response = "Here you go:\n```json\n{\"test_scenarios\": [{\"name\": \"Login\", \"priority\": \"low\"}]}\n```";
        let scenarios = parse_scenarios(response);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, "Login");
        assert_eq!(scenarios[0].priority, Priority::Low);
    }

    #[test]
    fn short_and_empty_lists_are_accepted() {
        assert!(parse_scenarios(r#"{"test_scenarios": []}"#).is_empty());
        assert!(parse_scenarios(r#"{"other": 1}"#).is_empty());
        assert_eq!(parse_scenarios(r#"{"test_scenarios": [{"name": "a"}, {"name": "b"}]}"#).len(), 2);
    }

    #[test]
    fn error_envelope_falls_back() {
        assert_eq!(parse_scenarios(r#"{"status": "500", "message": "down"}"#).len(), 3);
    }

    #[test]
    fn plan_report_lists_steps_and_assumptions() {
        let mut scenarios = default_scenarios();
        scenarios[0].assumptions = vec!["Fresh session".to_string()];
        let report = render_plan("https://example.com", &scenarios);
        assert!(report.starts_with("# Test Plan"));
        assert!(report.contains("**URL:** https://example.com"));
        assert!(report.contains("### 1. Page load test"));
        assert!(report.contains("1. Open the home page"));
        assert!(report.contains("- Fresh session"));
        assert!(report.contains("**Seed file:** tests/seed.spec.ts"));
    }
}
