use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use testpilot_browser::ScriptLanguage;

pub const DEFAULT_FRAMEWORK: &str = "playwright";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Failed,
}

impl CodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A generated test script. Regeneration and healing add rows, never edit them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub id: String,
    pub plan_id: String,
    pub framework: String,
    pub language: ScriptLanguage,
    #[serde(default)]
    pub code: String,
    /// Config block emitted alongside the script, when the model produced one.
    #[serde(default)]
    pub config: Option<String>,
    pub status: CodeStatus,
    /// Selector sharpening had a real page snapshot to work from.
    #[serde(default)]
    pub enhanced: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub llm_config_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GeneratedCode {
    pub fn new(plan_id: impl Into<String>, framework: impl Into<String>, language: ScriptLanguage) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            plan_id: plan_id.into(),
            framework: framework.into(),
            language,
            code: String::new(),
            config: None,
            status: CodeStatus::Generating,
            enhanced: false,
            error_message: None,
            llm_config_id: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A completed sibling carrying `code`, for healed output.
    pub fn derive_fixed(&self, code: String) -> Self {
        let mut fixed = Self::new(self.plan_id.clone(), self.framework.clone(), self.language);
        fixed.code = code;
        fixed.config = self.config.clone();
        fixed.enhanced = self.enhanced;
        fixed.status = CodeStatus::Completed;
        fixed
    }
}
