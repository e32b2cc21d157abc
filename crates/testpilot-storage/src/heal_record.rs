//! Heal record storage - byte-level API.

use crate::define_simple_storage;

define_simple_storage! {
    /// Raw heal record rows, newest first when listed.
    pub struct HealRecordStorage { table: "heal_records" }
}
