//! TestPilot Storage - byte-level persistence on redb.
//!
//! Rows are opaque bytes keyed by id; the typed wrappers in testpilot-core
//! own the models and their serialization. Every entity table carries a
//! creation-order index so listings come back newest first.
//!
//! # Tables
//!
//! - `test_plans` - Explored test plans
//! - `generated_codes` - Generated test scripts
//! - `executions` - Execution records with step traces
//! - `heal_records` - Self-healing attempts
//! - `llm_configs` - Text-completion client configs
//! - `protocol_configs` - Browser protocol server configs

pub mod execution;
pub mod generated_code;
pub mod heal_record;
pub mod llm_config;
pub mod pagination;
pub mod paths;
pub mod protocol_config;
pub mod simple_storage;
pub mod test_plan;

use anyhow::{Context, Result};
use redb::Database;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub use execution::ExecutionStorage;
pub use generated_code::GeneratedCodeStorage;
pub use heal_record::HealRecordStorage;
pub use llm_config::LlmConfigStorage;
pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, paginate};
pub use protocol_config::ProtocolConfigStorage;
pub use simple_storage::SimpleStorage;
pub use test_plan::TestPlanStorage;

/// Central storage manager that opens every entity table.
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
    /// Open (or create) the database at `path` and initialize all tables.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let db = Arc::new(
            Database::create(path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?,
        );
        debug!(path = %path.display(), "Opened storage");

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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_storage_creates_nested_path_and_reopens() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("testpilot.db");

        {
            let storage = Storage::new(&path).unwrap();
            storage.test_plans.put_raw("plan-1", 10, b"{}").unwrap();
        }

        let storage = Storage::new(&path).unwrap();
        assert!(storage.test_plans.exists("plan-1").unwrap());
        assert_eq!(storage.executions.count().unwrap(), 0);
    }
}
