use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealStatus {
    #[default]
    Pending,
    Healing,
    Success,
    Failed,
}

impl HealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Healing => "healing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeImpact {
    High,
    Medium,
    #[default]
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    CodeModification,
    WaitAdded,
    ErrorHandlingAdded,
    SelectorUpdated,
    AssertionUpdated,
    RetryAdded,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeModification => "code_modification",
            Self::WaitAdded => "wait_added",
            Self::ErrorHandlingAdded => "error_handling_added",
            Self::SelectorUpdated => "selector_updated",
            Self::AssertionUpdated => "assertion_updated",
            Self::RetryAdded => "retry_added",
        }
    }
}

/// One detected difference between the original and the healed script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub description: String,
    #[serde(default)]
    pub impact: ChangeImpact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_added: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_removed: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_selectors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_selectors: Vec<String>,
}

impl CodeChange {
    pub fn tagged(kind: ChangeKind, description: impl Into<String>, impact: ChangeImpact) -> Self {
        Self {
            kind,
            description: description.into(),
            impact,
            diff: None,
            lines_added: None,
            lines_removed: None,
            added_selectors: Vec::new(),
            removed_selectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealRecord {
    pub id: String,
    pub execution_id: String,
    pub original_code_id: String,
    #[serde(default)]
    pub fixed_code_id: Option<String>,
    pub status: HealStatus,
    #[serde(default)]
    pub error_analysis: String,
    #[serde(default)]
    pub fix_description: String,
    #[serde(default)]
    pub changes: Vec<CodeChange>,
    #[serde(default)]
    pub confidence: f64,
    /// Live page state probed while healing, if the probe succeeded.
    #[serde(default)]
    pub page_state: Option<Value>,
    #[serde(default)]
    pub llm_config_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HealRecord {
    /// A new record in the `healing` state.
    pub fn new(execution_id: impl Into<String>, original_code_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            original_code_id: original_code_id.into(),
            fixed_code_id: None,
            status: HealStatus::Healing,
            error_analysis: String::new(),
            fix_description: String::new(),
            changes: Vec::new(),
            confidence: 0.0,
            page_state: None,
            llm_config_id: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}
