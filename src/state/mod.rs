use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::CoreState;
use crate::core::history::HistoryError;

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    /// Process-wide capability clients shared read-only by every session
    pub core_state: Arc<CoreState>,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, HistoryError> {
        let core_state = CoreState::new(&config).await?;
        Ok(Self::with_core(config, core_state))
    }

    /// Wrap an already built core, e.g. one wired with custom capabilities
    pub fn with_core(config: ServerConfig, core_state: Arc<CoreState>) -> Arc<Self> {
        Arc::new(Self { config, core_state })
    }
}
