//! Generated code storage - byte-level API.

use crate::define_simple_storage;

define_simple_storage! {
    /// Raw generated code rows, newest first when listed.
    pub struct GeneratedCodeStorage { table: "generated_codes" }
}
