//! LLM config storage.

use crate::define_simple_storage;

define_simple_storage! {
    pub struct LlmConfigStorage { table: "llm_configs" }
}
