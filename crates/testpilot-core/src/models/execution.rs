use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BROWSER: &str = "chromium";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// One dispatched browser action in an execution trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    /// 1-based, matches extraction order.
    pub step_number: usize,
    pub action: String,
    pub description: String,
    /// Base64 image taken before the action.
    #[serde(default)]
    pub screenshot_before: Option<String>,
    #[serde(default)]
    pub screenshot_after: Option<String>,
    pub status: StepStatus,
    /// Seconds.
    pub duration: f64,
    /// ISO-8601.
    pub timestamp: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub code_id: String,
    pub browser: String,
    pub headless: bool,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Structured step trace; each record may carry before/after images.
    #[serde(default)]
    pub screenshots: Vec<StepRecord>,
    /// Reserved.
    #[serde(default)]
    pub videos: Vec<String>,
    /// Tier that produced the result: remote, local or subprocess.
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub protocol_config_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Execution {
    /// A new execution already in the `running` state.
    pub fn start(code_id: impl Into<String>, browser: impl Into<String>, headless: bool) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code_id: code_id.into(),
            browser: browser.into(),
            headless,
            status: ExecutionStatus::Running,
            started_at: Some(now),
            ended_at: None,
            duration: None,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            error_message: None,
            screenshots: Vec::new(),
            videos: Vec::new(),
            backend: None,
            protocol_config_id: None,
            created_by: None,
            created_at: now,
        }
    }

    /// Stamp the end time and wall-clock duration.
    pub fn finish(&mut self, status: ExecutionStatus) {
        let ended = Utc::now();
        self.status = status;
        self.ended_at = Some(ended);
        self.duration = self
            .started_at
            .map(|started| (ended - started).num_milliseconds().max(0) as f64 / 1000.0);
    }
}

/// Step trace view of one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSteps {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub steps: Vec<StepRecord>,
    pub total_steps: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_sets_terminal_fields() {
        let mut execution = Execution::start("code-1", DEFAULT_BROWSER, true);
        assert_eq!(execution.status, ExecutionStatus::Running);

        execution.finish(ExecutionStatus::Failed);
        assert!(execution.status.is_terminal());
        assert!(execution.ended_at.is_some());
        assert!(execution.duration.unwrap() >= 0.0);
    }
}
