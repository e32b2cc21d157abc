//! Explore phase and test plan accessors.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{llm, protocol};
use crate::AppCore;
use crate::agents::Planner;
use crate::models::{DEFAULT_EXPLORE_TIMEOUT_SECS, DEFAULT_MAX_DEPTH, PlanStatus, TestPlan};
use crate::storage::{Page, PlanFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploreRequest {
    pub url: String,
    #[serde(default)]
    pub llm_config_id: Option<String>,
    #[serde(default)]
    pub protocol_config_id: Option<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_timeout_secs() -> u64 {
    DEFAULT_EXPLORE_TIMEOUT_SECS
}

impl ExploreRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            llm_config_id: None,
            protocol_config_id: None,
            max_depth: DEFAULT_MAX_DEPTH,
            timeout_secs: DEFAULT_EXPLORE_TIMEOUT_SECS,
            requirements: None,
            created_by: None,
        }
    }
}

/// Explore `request.url` and persist the resulting plan.
///
/// Returns the plan in a terminal state; exploration failures are recorded
/// on the plan, not returned.
pub async fn explore(core: &Arc<AppCore>, request: ExploreRequest) -> Result<TestPlan> {
    let url = request.url.trim();
    if url.is_empty() {
        bail!("URL must not be empty");
    }
    if request.max_depth == 0 {
        bail!("max_depth must be at least 1");
    }
    let llm_config = llm::select_config(core, request.llm_config_id.as_deref())?;
    let server = protocol::select_server(core, request.protocol_config_id.as_deref())?;

    let mut plan = TestPlan::new(url, request.max_depth, request.timeout_secs);
    plan.requirements = request.requirements.filter(|text| !text.trim().is_empty());
    plan.llm_config_id = llm_config.as_ref().map(|config| config.id.clone());
    plan.created_by = request.created_by;
    core.storage
        .test_plans
        .save(&plan)
        .context("Failed to save test plan")?;
    info!(plan_id = %plan.id, url = %plan.url, "Test plan created");

    match llm::text_generator(core, llm_config.as_ref()) {
        Ok(generator) => {
            Planner::new(core.factory.clone(), generator)
                .explore(&mut plan, server.as_ref())
                .await;
        }
        Err(err) => {
            error!(plan_id = %plan.id, error = %err, "No text-completion client for exploration");
            plan.status = PlanStatus::Failed;
            plan.error_message = Some(format!("{err:#}"));
            plan.updated_at = Utc::now();
        }
    }

    core.storage
        .test_plans
        .save(&plan)
        .context("Failed to save explored test plan")?;
    Ok(plan)
}

pub async fn get_plan(core: &Arc<AppCore>, id: &str) -> Result<TestPlan> {
    core.storage.test_plans.require(id)
}

pub async fn list_plans(core: &Arc<AppCore>, filter: &PlanFilter, page: usize, page_size: usize) -> Result<Page<TestPlan>> {
    core.storage.test_plans.list_page(filter, page, page_size)
}

pub async fn delete_plan(core: &Arc<AppCore>, id: &str) -> Result<()> {
    if !core.storage.test_plans.delete(id)? {
        bail!("Test plan {} not found", id);
    }
    info!(plan_id = %id, "Test plan deleted");
    Ok(())
}
