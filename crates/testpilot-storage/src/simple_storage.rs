use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::sync::Arc;

/// Width of the zero-padded timestamp prefix in creation-index keys.
const INDEX_TS_WIDTH: usize = 20;

/// Key in a creation index: sorts by creation time, then id.
pub fn created_index_key(created_at_ms: i64, id: &str) -> String {
    format!(
        "{:0width$}:{id}",
        created_at_ms.max(0),
        width = INDEX_TS_WIDTH
    )
}

/// Trait for entity tables keyed by id with a creation-order index.
///
/// Rows are opaque bytes; typed wrappers in the core crate own serialization.
/// Implementors only need to name the two tables and hand out the database.
pub trait SimpleStorage: Send + Sync {
    /// id -> serialized row
    const TABLE: TableDefinition<'static, &'static str, &'static [u8]>;

    /// `created_index_key` -> id
    const INDEX: TableDefinition<'static, &'static str, &'static str>;

    fn db(&self) -> &Arc<Database>;

    /// Insert or overwrite a row. `created_at_ms` must stay stable across
    /// overwrites of the same id so the index keeps a single entry.
    fn put_raw(&self, id: &str, created_at_ms: i64, data: &[u8]) -> Result<()> {
        let write_txn = self.db().begin_write()?;
        {
            let mut table = write_txn.open_table(Self::TABLE)?;
            table.insert(id, data)?;
            let mut index = write_txn.open_table(Self::INDEX)?;
            let key = created_index_key(created_at_ms, id);
            index.insert(key.as_str(), id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(Self::TABLE)?;

        if let Some(value) = table.get(id)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// All rows as (id, data), newest first.
    fn list_raw(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(Self::TABLE)?;
        let index = read_txn.open_table(Self::INDEX)?;

        let mut items = Vec::new();
        for entry in index.iter()?.rev() {
            let (_, id) = entry?;
            let id = id.value();
            if let Some(value) = table.get(id)? {
                items.push((id.to_string(), value.value().to_vec()));
            }
        }

        Ok(items)
    }

    /// Delete a row and its index entry; returns true if the row existed.
    fn delete(&self, id: &str) -> Result<bool> {
        let write_txn = self.db().begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(Self::TABLE)?;
            let existed = table.remove(id)?.is_some();

            let mut index = write_txn.open_table(Self::INDEX)?;
            let mut stale = Vec::new();
            for entry in index.iter()? {
                let (key, value) = entry?;
                if value.value() == id {
                    stale.push(key.value().to_string());
                }
            }
            for key in stale {
                index.remove(key.as_str())?;
            }
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(Self::TABLE)?;
        Ok(table.get(id)?.is_some())
    }

    fn count(&self) -> Result<usize> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(Self::TABLE)?;
        Ok(table.len()? as usize)
    }
}

/// Macro to generate an entity storage struct backed by [`SimpleStorage`].
#[macro_export]
macro_rules! define_simple_storage {
    ( $(#[$meta:meta])* $vis:vis struct $name:ident { table: $table_name:literal } ) => {
        const TABLE: redb::TableDefinition<'static, &'static str, &'static [u8]> =
            redb::TableDefinition::new($table_name);
        const INDEX: redb::TableDefinition<'static, &'static str, &'static str> =
            redb::TableDefinition::new(concat!($table_name, ":by_created"));

        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            db: std::sync::Arc<redb::Database>,
        }

        impl $name {
            pub fn new(db: std::sync::Arc<redb::Database>) -> anyhow::Result<Self> {
                let write_txn = db.begin_write()?;
                write_txn.open_table(TABLE)?;
                write_txn.open_table(INDEX)?;
                write_txn.commit()?;

                Ok(Self { db })
            }

            pub fn put_raw(&self, id: &str, created_at_ms: i64, data: &[u8]) -> anyhow::Result<()> {
                <Self as $crate::SimpleStorage>::put_raw(self, id, created_at_ms, data)
            }

            pub fn get_raw(&self, id: &str) -> anyhow::Result<Option<Vec<u8>>> {
                <Self as $crate::SimpleStorage>::get_raw(self, id)
            }

            pub fn list_raw(&self) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
                <Self as $crate::SimpleStorage>::list_raw(self)
            }

            pub fn delete(&self, id: &str) -> anyhow::Result<bool> {
                <Self as $crate::SimpleStorage>::delete(self, id)
            }

            pub fn exists(&self, id: &str) -> anyhow::Result<bool> {
                <Self as $crate::SimpleStorage>::exists(self, id)
            }

            pub fn count(&self) -> anyhow::Result<usize> {
                <Self as $crate::SimpleStorage>::count(self)
            }
        }

        impl $crate::SimpleStorage for $name {
            const TABLE: redb::TableDefinition<'static, &'static str, &'static [u8]> = TABLE;
            const INDEX: redb::TableDefinition<'static, &'static str, &'static str> = INDEX;

            fn db(&self) -> &std::sync::Arc<redb::Database> {
                &self.db
            }
        }
    };
}
