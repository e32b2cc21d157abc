//! Execute phase and execution accessors.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::protocol;
use crate::AppCore;
use crate::agents::ExecutionEngine;
use crate::models::{CodeStatus, DEFAULT_BROWSER, Execution, ExecutionSteps};
use crate::storage::{ExecutionFilter, Page};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code_id: String,
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub protocol_config_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_browser() -> String {
    DEFAULT_BROWSER.to_string()
}

fn default_headless() -> bool {
    true
}

impl ExecuteRequest {
    pub fn new(code_id: impl Into<String>) -> Self {
        Self {
            code_id: code_id.into(),
            browser: default_browser(),
            headless: true,
            protocol_config_id: None,
            created_by: None,
        }
    }
}

/// Run a generated script and persist the execution with its step trace.
pub async fn execute(core: &Arc<AppCore>, request: ExecuteRequest) -> Result<Execution> {
    let code = core.storage.generated_codes.require(&request.code_id)?;
    if code.status != CodeStatus::Completed || code.code.trim().is_empty() {
        bail!("Generated code {} has no runnable script (status: {})", code.id, code.status.as_str());
    }
    let server = protocol::select_server(core, request.protocol_config_id.as_deref())?;

    let browser = if request.browser.trim().is_empty() {
        default_browser()
    } else {
        request.browser
    };
    let mut execution = Execution::start(&code.id, browser, request.headless);
    execution.protocol_config_id = request.protocol_config_id;
    execution.created_by = request.created_by;
    core.storage
        .executions
        .save(&execution)
        .context("Failed to save execution")?;

    ExecutionEngine::new(core.factory.clone())
        .execute(&code, &mut execution, server.as_ref())
        .await;

    core.storage
        .executions
        .save(&execution)
        .context("Failed to save finished execution")?;
    Ok(execution)
}

pub async fn get_execution(core: &Arc<AppCore>, id: &str) -> Result<Execution> {
    core.storage.executions.require(id)
}

pub async fn list_executions(
    core: &Arc<AppCore>,
    filter: &ExecutionFilter,
    page: usize,
    page_size: usize,
) -> Result<Page<Execution>> {
    core.storage.executions.list_page(filter, page, page_size)
}

pub async fn delete_execution(core: &Arc<AppCore>, id: &str) -> Result<()> {
    if !core.storage.executions.delete(id)? {
        bail!("Execution {} not found", id);
    }
    info!(execution_id = %id, "Execution deleted");
    Ok(())
}

/// The structured step trace of one execution.
pub async fn get_steps(core: &Arc<AppCore>, id: &str) -> Result<ExecutionSteps> {
    let execution = core.storage.executions.require(id)?;
    Ok(ExecutionSteps {
        execution_id: execution.id,
        status: execution.status,
        total_steps: execution.screenshots.len(),
        steps: execution.screenshots,
    })
}
