use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::status::JobStore;
use crate::services::storage::FileStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jobs: JobStore,
    /// Delivery store; `None` when storage credentials are not configured.
    pub storage: Option<Arc<dyn FileStore>>,
}

impl AppState {
    pub fn new(config: AppConfig, storage: Option<Arc<dyn FileStore>>) -> Self {
        Self {
            jobs: JobStore::new(config.jobs_dir.clone()),
            config: Arc::new(config),
            storage,
        }
    }
}
