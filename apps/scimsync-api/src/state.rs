//! Shared state handed to every route.

use std::sync::Arc;

use scimsync_engine::{ReconciliationEngine, SyncStatusStore};

use crate::config::Config;
use crate::scheduler::SyncScheduler;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<ReconciliationEngine>,
    pub status: SyncStatusStore,
    pub scheduler: Arc<SyncScheduler>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        engine: Arc<ReconciliationEngine>,
        status: SyncStatusStore,
        scheduler: Arc<SyncScheduler>,
    ) -> Self {
        Self {
            config,
            engine,
            status,
            scheduler,
        }
    }

    /// Engine, status and scheduler wired together for `config`.
    #[must_use]
    pub fn with_engine(config: Config, engine: ReconciliationEngine) -> Self {
        let engine = Arc::new(engine);
        let status = SyncStatusStore::new();
        let scheduler = Arc::new(SyncScheduler::new(
            engine.clone(),
            status.clone(),
            config.sync.interval(),
        ));
        Self::new(Arc::new(config), engine, status, scheduler)
    }

    pub(crate) fn require_development(&self, what: &str) -> Result<(), crate::error::ApiError> {
        if self.config.environment.is_development() {
            Ok(())
        } else {
            Err(crate::error::ApiError::Forbidden(format!(
                "{what} is only available in the development environment"
            )))
        }
    }
}
