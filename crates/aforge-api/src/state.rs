//! Application state.

use std::sync::Arc;

use aforge_pipeline::{JobStore, Orchestrator, PipelineConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: JobStore,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig, pipeline_config: PipelineConfig) -> Self {
        let store = JobStore::new();
        let orchestrator = Orchestrator::new(store.clone(), pipeline_config);

        Self {
            config,
            store,
            orchestrator,
        }
    }
}
