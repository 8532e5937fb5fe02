use vidup_core::{Config, OrchestratorHandle};

/// Shared application state for the HTTP layer.
pub struct AppState {
    config: Config,
    orchestrator: OrchestratorHandle,
}

impl AppState {
    pub fn new(config: Config, orchestrator: OrchestratorHandle) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &OrchestratorHandle {
        &self.orchestrator
    }
}
