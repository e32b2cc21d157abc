//! Typed execution storage wrapper.

use crate::models::{Execution, ExecutionStatus};
use anyhow::{Result, anyhow};
use redb::Database;
use std::sync::Arc;
use testpilot_storage::{Page, paginate};

use super::codec;

#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub code_id: Option<String>,
    pub status: Option<ExecutionStatus>,
}

impl ExecutionFilter {
    fn matches(&self, execution: &Execution) -> bool {
        self.code_id
            .as_deref()
            .is_none_or(|id| execution.code_id == id)
            && self.status.is_none_or(|status| execution.status == status)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionStorage {
    inner: testpilot_storage::ExecutionStorage,
}

impl ExecutionStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            inner: testpilot_storage::ExecutionStorage::new(db)?,
        })
    }

    pub fn save(&self, execution: &Execution) -> Result<()> {
        codec::put(&self.inner, &execution.id, &execution.created_at, execution)
    }

    pub fn get(&self, id: &str) -> Result<Option<Execution>> {
        codec::get(&self.inner, id)
    }

    pub fn require(&self, id: &str) -> Result<Execution> {
        self.get(id)?
            .ok_or_else(|| anyhow!("Execution {} not found", id))
    }

    pub fn list(&self) -> Result<Vec<Execution>> {
        codec::list(&self.inner)
    }

    pub fn list_page(
        &self,
        filter: &ExecutionFilter,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Execution>> {
        let executions = self
            .list()?
            .into_iter()
            .filter(|execution| filter.matches(execution))
            .collect();
        Ok(paginate(executions, page, page_size))
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_terminal_update_overwrites_in_place() {
        let temp_dir = tempdir().unwrap();
        let db = Arc::new(Database::create(temp_dir.path().join("test.db")).unwrap());
        let store = ExecutionStorage::new(db).unwrap();

        let mut execution = Execution::start("code-1", "chromium", true);
        store.save(&execution).unwrap();
        execution.finish(ExecutionStatus::Success);
        store.save(&execution).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, ExecutionStatus::Success);

        let filter = ExecutionFilter {
            code_id: Some("code-2".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list_page(&filter, 1, 20).unwrap().total, 0);
    }
}
