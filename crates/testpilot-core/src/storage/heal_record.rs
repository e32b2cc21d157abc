//! Typed heal record storage wrapper.

use crate::models::{HealRecord, HealStatus};
use anyhow::{Result, anyhow};
use redb::Database;
use std::sync::Arc;
use testpilot_storage::{Page, paginate};

use super::codec;

#[derive(Debug, Clone, Default)]
pub struct HealFilter {
    pub execution_id: Option<String>,
    pub status: Option<HealStatus>,
}

impl HealFilter {
    fn matches(&self, record: &HealRecord) -> bool {
        self.execution_id
            .as_deref()
            .is_none_or(|id| record.execution_id == id)
            && self.status.is_none_or(|status| record.status == status)
    }
}

#[derive(Debug, Clone)]
pub struct HealRecordStorage {
    inner: testpilot_storage::HealRecordStorage,
}

impl HealRecordStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            inner: testpilot_storage::HealRecordStorage::new(db)?,
        })
    }

    pub fn save(&self, record: &HealRecord) -> Result<()> {
        codec::put(&self.inner, &record.id, &record.created_at, record)
    }

    pub fn get(&self, id: &str) -> Result<Option<HealRecord>> {
        codec::get(&self.inner, id)
    }

    pub fn require(&self, id: &str) -> Result<HealRecord> {
        self.get(id)?
            .ok_or_else(|| anyhow!("Heal record {} not found", id))
    }

    pub fn list(&self) -> Result<Vec<HealRecord>> {
        codec::list(&self.inner)
    }

    pub fn list_page(
        &self,
        filter: &HealFilter,
        page: usize,
        page_size: usize,
    ) -> Result<Page<HealRecord>> {
        let records = self
            .list()?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();
        Ok(paginate(records, page, page_size))
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id)
    }
}
