//! Execution storage - byte-level API.

use crate::define_simple_storage;

define_simple_storage! {
    /// Raw execution rows, newest first when listed.
    pub struct ExecutionStorage { table: "executions" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::Database;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_tables_are_isolated() {
        let temp_dir = tempdir().unwrap();
        let db = Arc::new(Database::create(temp_dir.path().join("test.db")).unwrap());
        let executions = ExecutionStorage::new(db.clone()).unwrap();
        let heals = crate::HealRecordStorage::new(db).unwrap();

        executions.put_raw("shared-id", 1, b"execution").unwrap();

        assert!(executions.exists("shared-id").unwrap());
        assert!(!heals.exists("shared-id").unwrap());
        assert_eq!(heals.count().unwrap(), 0);
    }
}
