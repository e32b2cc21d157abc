//! Test plan storage - byte-level API.

use crate::define_simple_storage;

define_simple_storage! {
    /// Raw test plan rows, newest first when listed.
    pub struct TestPlanStorage { table: "test_plans" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::Database;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_put_and_get_raw() {
        let temp_dir = tempdir().unwrap();
        let db = Arc::new(Database::create(temp_dir.path().join("test.db")).unwrap());
        let storage = TestPlanStorage::new(db).unwrap();

        storage.put_raw("plan-001", 1_700_000_000_000, b"{}").unwrap();

        let retrieved = storage.get_raw("plan-001").unwrap();
        assert_eq!(retrieved.as_deref(), Some(&b"{}"[..]));
        assert!(storage.get_raw("plan-002").unwrap().is_none());
    }
}
