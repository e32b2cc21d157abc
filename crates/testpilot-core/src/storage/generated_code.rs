//! Typed generated code storage wrapper.

use crate::models::{CodeStatus, GeneratedCode};
use anyhow::{Result, anyhow};
use redb::Database;
use std::sync::Arc;
use testpilot_browser::ScriptLanguage;
use testpilot_storage::{Page, paginate};

use super::codec;

#[derive(Debug, Clone, Default)]
pub struct CodeFilter {
    pub plan_id: Option<String>,
    pub status: Option<CodeStatus>,
    pub language: Option<ScriptLanguage>,
}

impl CodeFilter {
    fn matches(&self, code: &GeneratedCode) -> bool {
        self.plan_id.as_deref().is_none_or(|id| code.plan_id == id)
            && self.status.is_none_or(|status| code.status == status)
            && self.language.is_none_or(|language| code.language == language)
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedCodeStorage {
    inner: testpilot_storage::GeneratedCodeStorage,
}

impl GeneratedCodeStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            inner: testpilot_storage::GeneratedCodeStorage::new(db)?,
        })
    }

    pub fn save(&self, code: &GeneratedCode) -> Result<()> {
        codec::put(&self.inner, &code.id, &code.created_at, code)
    }

    pub fn get(&self, id: &str) -> Result<Option<GeneratedCode>> {
        codec::get(&self.inner, id)
    }

    pub fn require(&self, id: &str) -> Result<GeneratedCode> {
        self.get(id)?
            .ok_or_else(|| anyhow!("Generated code {} not found", id))
    }

    pub fn list(&self) -> Result<Vec<GeneratedCode>> {
        codec::list(&self.inner)
    }

    pub fn list_page(
        &self,
        filter: &CodeFilter,
        page: usize,
        page_size: usize,
    ) -> Result<Page<GeneratedCode>> {
        let codes = self
            .list()?
            .into_iter()
            .filter(|code| filter.matches(code))
            .collect();
        Ok(paginate(codes, page, page_size))
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id)
    }

    pub fn count(&self) -> Result<usize> {
        self.inner.count()
    }
}
