//! Storage layer with typed wrappers around testpilot-storage.
//!
//! Models are stored as JSON rows; every wrapper lists newest first.

mod codec;
pub mod config;
pub mod execution;
pub mod generated_code;
pub mod heal_record;
pub mod test_plan;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use config::{LlmConfigStorage, ProtocolConfigStorage};
pub use execution::{ExecutionFilter, ExecutionStorage};
pub use generated_code::{CodeFilter, GeneratedCodeStorage};
pub use heal_record::{HealFilter, HealRecordStorage};
pub use test_plan::{PlanFilter, TestPlanStorage};
pub use testpilot_storage::{DEFAULT_PAGE_SIZE, Page};

/// Central storage manager with typed access to every entity.
pub struct Storage {
    db: Arc<Database>,
    pub test_plans: TestPlanStorage,
    pub generated_codes: GeneratedCodeStorage,
    pub executions: ExecutionStorage,
    pub heal_records: HealRecordStorage,
    pub llm_configs: LlmConfigStorage,
    pub protocol_configs: ProtocolConfigStorage,
}

impl Storage {
    /// Open (or create) the database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = testpilot_storage::Storage::new(path)?.get_db();

        Ok(Self {
            test_plans: TestPlanStorage::new(db.clone())?,
            generated_codes: GeneratedCodeStorage::new(db.clone())?,
            executions: ExecutionStorage::new(db.clone())?,
            heal_records: HealRecordStorage::new(db.clone())?,
            llm_configs: LlmConfigStorage::new(db.clone())?,
            protocol_configs: ProtocolConfigStorage::new(db.clone())?,
            db,
        })
    }

    /// Get a reference to the underlying database
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}
