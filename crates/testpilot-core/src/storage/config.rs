//! Typed LLM and protocol config storage.

use crate::models::{LlmConfig, ProtocolConfig};
use anyhow::{Result, anyhow};
use redb::Database;
use std::sync::Arc;

use super::codec;

#[derive(Debug, Clone)]
pub struct LlmConfigStorage {
    inner: testpilot_storage::LlmConfigStorage,
}

impl LlmConfigStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            inner: testpilot_storage::LlmConfigStorage::new(db)?,
        })
    }

    /// Save a config. Flagging it default clears the flag on every other one.
    pub fn save(&self, config: &LlmConfig) -> Result<()> {
        if config.is_default {
            for mut other in self.list()? {
                if other.id != config.id && other.is_default {
                    other.is_default = false;
                    codec::put(&self.inner, &other.id, &other.created_at, &other)?;
                }
            }
        }
        codec::put(&self.inner, &config.id, &config.created_at, config)
    }

    pub fn get(&self, id: &str) -> Result<Option<LlmConfig>> {
        codec::get(&self.inner, id)
    }

    pub fn require(&self, id: &str) -> Result<LlmConfig> {
        self.get(id)?
            .ok_or_else(|| anyhow!("LLM config {} not found", id))
    }

    pub fn list(&self) -> Result<Vec<LlmConfig>> {
        codec::list(&self.inner)
    }

    pub fn find_default(&self) -> Result<Option<LlmConfig>> {
        Ok(self.list()?.into_iter().find(|config| config.is_default))
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id)
    }
}

#[derive(Debug, Clone)]
pub struct ProtocolConfigStorage {
    inner: testpilot_storage::ProtocolConfigStorage,
}

impl ProtocolConfigStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self {
            inner: testpilot_storage::ProtocolConfigStorage::new(db)?,
        })
    }

    pub fn save(&self, config: &ProtocolConfig) -> Result<()> {
        codec::put(&self.inner, &config.id, &config.created_at, config)
    }

    pub fn get(&self, id: &str) -> Result<Option<ProtocolConfig>> {
        codec::get(&self.inner, id)
    }

    pub fn require(&self, id: &str) -> Result<ProtocolConfig> {
        self.get(id)?
            .ok_or_else(|| anyhow!("Protocol config {} not found", id))
    }

    pub fn list(&self) -> Result<Vec<ProtocolConfig>> {
        codec::list(&self.inner)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;
    use testpilot_ai::LlmProvider;

    #[test]
    fn test_single_default_config() {
        let temp_dir = tempdir().unwrap();
        let db = Arc::new(Database::create(temp_dir.path().join("test.db")).unwrap());
        let store = LlmConfigStorage::new(db).unwrap();

        let mut first = LlmConfig::new("first", LlmProvider::OpenAI, "gpt-4o-mini");
        first.created_at = first.created_at - Duration::seconds(5);
        first.is_default = true;
        store.save(&first).unwrap();

        let mut second = LlmConfig::new("second", LlmProvider::Anthropic, "claude");
        second.is_default = true;
        store.save(&second).unwrap();

        let default = store.find_default().unwrap().unwrap();
        assert_eq!(default.id, second.id);
        assert!(!store.require(&first.id).unwrap().is_default);
        assert_eq!(store.list().unwrap().len(), 2);
    }
}
