pub mod agents;
pub mod backend;
pub mod cascade;
pub mod models;
pub mod services;
pub mod steps;
pub mod storage;

pub use backend::{BackendFactory, DefaultBackendFactory};
pub use models::*;
pub use testpilot_storage::paths;

use std::path::Path;
use std::sync::Arc;
use storage::Storage;
use tracing::info;

/// Shared application state: persistence plus the backend construction seam.
///
/// Every phase operation in [`services`] takes an `&Arc<AppCore>`.
pub struct AppCore {
    pub storage: Arc<Storage>,
    pub factory: Arc<dyn BackendFactory>,
}

impl AppCore {
    pub async fn new(db_path: &str) -> anyhow::Result<Self> {
        Self::with_factory(db_path, Arc::new(DefaultBackendFactory::new()))
    }

    /// Open storage at `db_path` with a custom backend factory.
    pub fn with_factory(db_path: impl AsRef<Path>, factory: Arc<dyn BackendFactory>) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        let storage = Arc::new(Storage::new(db_path)?);
        info!(db_path = %db_path.display(), "Initializing TestPilot core");
        Ok(Self { storage, factory })
    }
}
