//! Upload orchestrator.
//!
//! A single control loop owns every slot and the pending queue. Commands
//! (enqueue, cancel, shutdown) arrive from `OrchestratorHandle`s; transfer
//! tasks and status queries report back as events on a separate channel.
//! Every applied change publishes a fresh `UploadsSnapshot`.
//!
//! - **Admission**: FIFO through the `ConcurrencyGate`, at most
//!   `concurrent_upload_limit` transfers at once
//! - **Transfer**: one spawned task per admitted slot, cancellable
//! - **Status**: one batched query per poll interval while any slot is processing

mod config;
mod handle;
mod runner;
mod types;
mod validate;

pub use config::OrchestratorConfig;
pub use handle::OrchestratorHandle;
pub use runner::UploadOrchestrator;
pub use types::{EnqueueOutcome, OrchestratorError, RejectedFile, UploadsSnapshot, ValidationError};
pub use validate::validate_file;
