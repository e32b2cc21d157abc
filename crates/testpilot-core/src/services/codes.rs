//! Generate phase and generated code accessors.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use testpilot_browser::ScriptLanguage;
use tracing::{error, info};

use super::llm;
use crate::AppCore;
use crate::agents::CodeGenerator;
use crate::models::{CodeStatus, DEFAULT_FRAMEWORK, GeneratedCode};
use crate::storage::{CodeFilter, Page};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub plan_id: String,
    #[serde(default)]
    pub llm_config_id: Option<String>,
    #[serde(default = "default_framework")]
    pub framework: String,
    #[serde(default)]
    pub language: ScriptLanguage,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_framework() -> String {
    DEFAULT_FRAMEWORK.to_string()
}

impl GenerateRequest {
    pub fn new(plan_id: impl Into<String>, language: ScriptLanguage) -> Self {
        Self {
            plan_id: plan_id.into(),
            llm_config_id: None,
            framework: default_framework(),
            language,
            created_by: None,
        }
    }
}

/// Generate a script for a plan's scenarios and persist it.
pub async fn generate(core: &Arc<AppCore>, request: GenerateRequest) -> Result<GeneratedCode> {
    let plan = core.storage.test_plans.require(&request.plan_id)?;
    let llm_config = llm::select_config(core, request.llm_config_id.as_deref())?;

    let framework = if request.framework.trim().is_empty() {
        default_framework()
    } else {
        request.framework
    };
    let mut code = GeneratedCode::new(&plan.id, framework, request.language);
    code.llm_config_id = llm_config.as_ref().map(|config| config.id.clone());
    code.created_by = request.created_by;
    core.storage
        .generated_codes
        .save(&code)
        .context("Failed to save generated code")?;

    match llm::text_generator(core, llm_config.as_ref()) {
        Ok(generator) => CodeGenerator::new(generator).generate(&plan, &mut code).await,
        Err(err) => {
            error!(code_id = %code.id, error = %err, "No text-completion client for generation");
            code.status = CodeStatus::Failed;
            code.error_message = Some(format!("{err:#}"));
            code.updated_at = Utc::now();
        }
    }

    core.storage
        .generated_codes
        .save(&code)
        .context("Failed to save generated code")?;
    info!(code_id = %code.id, status = code.status.as_str(), "Generation finished");
    Ok(code)
}

pub async fn get_code(core: &Arc<AppCore>, id: &str) -> Result<GeneratedCode> {
    core.storage.generated_codes.require(id)
}

pub async fn list_codes(core: &Arc<AppCore>, filter: &CodeFilter, page: usize, page_size: usize) -> Result<Page<GeneratedCode>> {
    core.storage.generated_codes.list_page(filter, page, page_size)
}

pub async fn delete_code(core: &Arc<AppCore>, id: &str) -> Result<()> {
    if !core.storage.generated_codes.delete(id)? {
        bail!("Generated code {} not found", id);
    }
    Ok(())
}
