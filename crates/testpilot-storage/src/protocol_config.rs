//! Protocol server config storage.

use crate::define_simple_storage;

define_simple_storage! {
    pub struct ProtocolConfigStorage { table: "protocol_configs" }
}
