//! Local runtime readiness for the subprocess execution tier.

use std::sync::Arc;

use anyhow::Result;
use testpilot_browser::RuntimeProbe;

use crate::AppCore;

pub async fn probe_runtime(core: &Arc<AppCore>) -> Result<RuntimeProbe> {
    core.factory.runner().probe().await
}
