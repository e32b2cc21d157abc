//! Heal phase and heal record accessors.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::llm;
use crate::AppCore;
use crate::agents::Healer;
use crate::models::{ExecutionStatus, GeneratedCode, HealRecord, HealStatus};
use crate::storage::{HealFilter, Page};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealRequest {
    pub execution_id: String,
    #[serde(default)]
    pub llm_config_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl HealRequest {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            llm_config_id: None,
            created_by: None,
        }
    }
}

/// Outcome of a heal: the record and, on success, the new fixed code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealResult {
    pub record: HealRecord,
    pub fixed_code: Option<GeneratedCode>,
}

/// Heal a failed execution, persisting the record and any fixed code.
pub async fn heal(core: &Arc<AppCore>, request: HealRequest) -> Result<HealResult> {
    let execution = core.storage.executions.require(&request.execution_id)?;
    if execution.status != ExecutionStatus::Failed {
        bail!("Only failed executions can be healed (execution {} is {})", execution.id, execution.status.as_str());
    }
    let original = core.storage.generated_codes.require(&execution.code_id)?;
    let llm_config = llm::select_config(core, request.llm_config_id.as_deref())?;

    let url = match core.storage.test_plans.get(&original.plan_id) {
        Ok(Some(plan)) => Some(plan.url),
        Ok(None) => None,
        Err(err) => {
            warn!(plan_id = %original.plan_id, error = %err, "Plan lookup failed, healing without page probe");
            None
        }
    };

    let mut record = HealRecord::new(&execution.id, &original.id);
    record.llm_config_id = llm_config.as_ref().map(|config| config.id.clone());
    record.created_by = request.created_by.clone();
    core.storage
        .heal_records
        .save(&record)
        .context("Failed to save heal record")?;

    let fixed_code = match llm::text_generator(core, llm_config.as_ref()) {
        Ok(generator) => {
            Healer::new(core.factory.clone(), generator)
                .heal(&mut record, &execution, &original, url.as_deref())
                .await
        }
        Err(err) => {
            error!(heal_id = %record.id, error = %err, "No text-completion client for healing");
            record.status = HealStatus::Failed;
            record.error_analysis = format!("{err:#}");
            record.updated_at = Utc::now();
            None
        }
    };

    let fixed_code = fixed_code.map(|mut fixed| {
        fixed.llm_config_id = record.llm_config_id.clone();
        fixed.created_by = request.created_by;
        fixed
    });
    if let Some(fixed) = &fixed_code {
        core.storage
            .generated_codes
            .save(fixed)
            .context("Failed to save fixed code")?;
    }
    core.storage
        .heal_records
        .save(&record)
        .context("Failed to save heal record")?;
    info!(heal_id = %record.id, status = record.status.as_str(), "Heal finished");

    Ok(HealResult { record, fixed_code })
}

pub async fn get_record(core: &Arc<AppCore>, id: &str) -> Result<HealRecord> {
    core.storage.heal_records.require(id)
}

pub async fn list_records(core: &Arc<AppCore>, filter: &HealFilter, page: usize, page_size: usize) -> Result<Page<HealRecord>> {
    core.storage.heal_records.list_page(filter, page, page_size)
}
