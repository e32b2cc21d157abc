use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MAX_DEPTH: u32 = 2;
pub const DEFAULT_EXPLORE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SEED_FILE: &str = "tests/seed.spec.ts";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Pending,
    Exploring,
    Completed,
    Failed,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Exploring => "exploring",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Unknown labels read as medium.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// One test scenario proposed by the planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub seed_file: Option<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub expected_result: String,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

impl Scenario {
    /// Lenient read of a model-produced scenario object.
    ///
    /// Missing fields default, priorities outside high/medium/low read as
    /// medium, and non-string steps are rendered as JSON text.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let list = |key: &str| -> Vec<String> {
            value
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            name: text("name"),
            description: text("description"),
            priority: value
                .get("priority")
                .and_then(Value::as_str)
                .map(Priority::from_label)
                .unwrap_or_default(),
            seed_file: value
                .get("seed_file")
                .and_then(Value::as_str)
                .map(str::to_string),
            steps: list("steps"),
            expected_result: text("expected_result"),
            assumptions: list("assumptions"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationMethod {
    McpServer,
    LocalBrowser,
    LlmInference,
}

impl ExplorationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::McpServer => "mcp_server",
            Self::LocalBrowser => "local_browser",
            Self::LlmInference => "llm_inference",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ElementCounts {
    pub links: usize,
    pub buttons: usize,
    pub inputs: usize,
}

/// Trace entry for one exploration pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplorationStep {
    pub step_number: usize,
    pub action: String,
    pub description: String,
    pub url: String,
    pub page_title: String,
    pub elements_found: ElementCounts,
    #[serde(default)]
    pub network_requests_count: usize,
    #[serde(default)]
    pub console_logs_count: usize,
    #[serde(default)]
    pub history_entries_count: usize,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplorationResult {
    pub method: ExplorationMethod,
    /// Page snapshot, screenshot included. Empty object for inference-only plans.
    pub snapshot: Value,
    #[serde(default)]
    pub steps: Vec<ExplorationStep>,
    /// Markdown rendering of the scenarios.
    pub plan_content: String,
    pub total_scenarios: usize,
    pub explored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPlan {
    pub id: String,
    pub url: String,
    pub max_depth: u32,
    pub timeout_secs: u64,
    #[serde(default)]
    pub requirements: Option<String>,
    pub status: PlanStatus,
    #[serde(default)]
    pub test_scenarios: Vec<Scenario>,
    #[serde(default)]
    pub exploration_result: Option<ExplorationResult>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub llm_config_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestPlan {
    /// A new plan in the `exploring` state.
    pub fn new(url: impl Into<String>, max_depth: u32, timeout_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            max_depth: max_depth.max(1),
            timeout_secs,
            requirements: None,
            status: PlanStatus::Exploring,
            test_scenarios: Vec::new(),
            exploration_result: None,
            error_message: None,
            llm_config_id: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The explored page snapshot, if it is usable for prompt enrichment.
    pub fn usable_snapshot(&self) -> Option<&Value> {
        let snapshot = &self.exploration_result.as_ref()?.snapshot;
        let map = snapshot.as_object()?;
        if map.is_empty() || map.contains_key("error") {
            None
        } else {
            Some(snapshot)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scenario_reads_loose_model_output() {
        let scenario = Scenario::from_value(&json!({
            "name": "Search",
            "priority": "URGENT",
            "steps": ["open", {"click": "#go"}],
        }));
        assert_eq!(scenario.name, "Search");
        assert_eq!(scenario.priority, Priority::Medium);
        assert_eq!(scenario.steps, vec!["open".to_string(), "{\"click\":\"#go\"}".to_string()]);
        assert!(scenario.assumptions.is_empty());
    }

    #[test]
    fn new_plan_starts_exploring() {
        let plan = TestPlan::new("https://example.com", 0, 60);
        assert_eq!(plan.status, PlanStatus::Exploring);
        assert_eq!(plan.max_depth, 1);
        assert!(plan.test_scenarios.is_empty());
        assert!(plan.usable_snapshot().is_none());
    }
}
