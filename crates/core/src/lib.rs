pub mod config;
pub mod gate;
pub mod metrics;
pub mod orchestrator;
pub mod slot;
pub mod status;
pub mod testing;
pub mod transport;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, EndpointsConfig,
    ServerConfig, TransportConfig,
};
pub use gate::{ConcurrencyGate, GateError, GatePermit};
pub use orchestrator::{
    validate_file, EnqueueOutcome, OrchestratorConfig, OrchestratorError, OrchestratorHandle,
    RejectedFile, UploadOrchestrator, UploadsSnapshot, ValidationError,
};
pub use slot::{
    load_previous_uploads, parse_previous_uploads, ErrorDetail, FileHandle, PreviousUpload,
    SeedError, SlotError, SlotId, UploadErrorKind, UploadSlot, UploadState,
};
pub use status::{
    HttpStatusClient, RemoteState, RemoteStatus, StatusClient, StatusError, StatusPoller,
    StatusUpdate,
};
pub use transport::{
    HttpUploadTransport, ProgressReporter, TransportError, UploadAccepted, UploadTransport,
};

/// Register every core metric with `registry`.
pub fn register_core_metrics(registry: &prometheus::Registry) -> Result<(), prometheus::Error> {
    for metric in metrics::all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}
