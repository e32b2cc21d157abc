//! Typed test plan storage wrapper.

use crate::models::{PlanStatus, TestPlan};
use anyhow::{Result, anyhow};
use redb::Database;
use std::sync::Arc;
use testpilot_storage::{Page, paginate};

use super::codec;

#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub status: Option<PlanStatus>,
    /// Substring match on the target URL.
    pub url_contains: Option<String>,
}

impl PlanFilter {
    fn matches(&self, plan: &TestPlan) -> bool {
        self.status.is_none_or(|status| plan.status == status)
            && self
                .url_contains
                .as_deref()
                .is_none_or(|needle| plan.url.contains(needle))
    }
}

#[derive(Debug, Clone)]
pub struct TestPlanStorage {
    inner: testpilot_storage::TestPlanStorage,
}

impl TestPlanStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            inner: testpilot_storage::TestPlanStorage::new(db)?,
        })
    }

    /// Insert or overwrite a plan.
    pub fn save(&self, plan: &TestPlan) -> Result<()> {
        codec::put(&self.inner, &plan.id, &plan.created_at, plan)
    }

    pub fn get(&self, id: &str) -> Result<Option<TestPlan>> {
        codec::get(&self.inner, id)
    }

    /// Get a plan or fail with a not-found error.
    pub fn require(&self, id: &str) -> Result<TestPlan> {
        self.get(id)?
            .ok_or_else(|| anyhow!("Test plan {} not found", id))
    }

    /// List all plans, newest first.
    pub fn list(&self) -> Result<Vec<TestPlan>> {
        codec::list(&self.inner)
    }

    pub fn list_page(&self, filter: &PlanFilter, page: usize, page_size: usize) -> Result<Page<TestPlan>> {
        let plans = self
            .list()?
            .into_iter()
            .filter(|plan| filter.matches(plan))
            .collect();
        Ok(paginate(plans, page, page_size))
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id)
    }

    pub fn count(&self) -> Result<usize> {
        self.inner.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn store() -> (TestPlanStorage, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db = Arc::new(Database::create(temp_dir.path().join("test.db")).unwrap());
        (TestPlanStorage::new(db).unwrap(), temp_dir)
    }

    #[test]
    fn test_filter_and_order() {
        let (store, _temp_dir) = store();
        let mut older = TestPlan::new("https://example.com/login", 2, 60);
        older.created_at = older.created_at - Duration::seconds(10);
        older.status = PlanStatus::Completed;
        let newer = TestPlan::new("https://other.org", 2, 60);
        store.save(&older).unwrap();
        store.save(&newer).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all[0].id, newer.id);
        assert_eq!(all[1].id, older.id);

        let filter = PlanFilter {
            url_contains: Some("example.com".to_string()),
            ..Default::default()
        };
        let page = store.list_page(&filter, 1, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, older.id);

        let filter = PlanFilter {
            status: Some(PlanStatus::Exploring),
            ..Default::default()
        };
        assert_eq!(store.list_page(&filter, 1, 10).unwrap().items[0].id, newer.id);
    }

    #[test]
    fn test_require_reports_missing_plan() {
        let (store, _temp_dir) = store();
        let err = store.require("missing").unwrap_err();
        assert_eq!(err.to_string(), "Test plan missing not found");
    }
}
