//! Server state management.

use std::sync::Arc;

use vigil_core::{InsightEngine, VigilConfig, VigilResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InsightEngine>,
}

impl AppState {
    pub fn new(engine: Arc<InsightEngine>) -> Self {
        Self { engine }
    }

    /// Build the engine from configuration.
    pub fn from_config(config: &VigilConfig) -> VigilResult<Self> {
        Ok(Self::new(Arc::new(InsightEngine::new(config)?)))
    }

    /// Every workspace in memory; used by tests and local runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InsightEngine::in_memory()))
    }
}
