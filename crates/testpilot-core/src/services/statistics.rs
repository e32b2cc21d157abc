//! Rollup across plans, codes, executions and heals.

use std::sync::Arc;

use anyhow::Result;

use crate::AppCore;
use crate::models::{ExecutionStatus, HealStatus, Statistics, percentage};

pub async fn get_statistics(core: &Arc<AppCore>) -> Result<Statistics> {
    let executions = core.storage.executions.list()?;
    let heals = core.storage.heal_records.list()?;

    let successful_executions = executions
        .iter()
        .filter(|execution| execution.status == ExecutionStatus::Success)
        .count();
    let failed_executions = executions
        .iter()
        .filter(|execution| execution.status == ExecutionStatus::Failed)
        .count();
    let successful_heals = heals
        .iter()
        .filter(|record| record.status == HealStatus::Success)
        .count();

    Ok(Statistics {
        total_plans: core.storage.test_plans.count()?,
        total_codes: core.storage.generated_codes.count()?,
        total_executions: executions.len(),
        successful_executions,
        failed_executions,
        total_heals: heals.len(),
        successful_heals,
        success_rate: percentage(successful_executions, executions.len()),
        heal_success_rate: percentage(successful_heals, heals.len()),
    })
}
