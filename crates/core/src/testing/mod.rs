//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the transport and status
//! traits, allowing orchestrator tests without a network.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidup_core::testing::{fixtures, MockStatusClient, MockUploadTransport};
//!
//! let transport = Arc::new(MockUploadTransport::holding());
//! let status = Arc::new(MockStatusClient::new());
//! let handle = UploadOrchestrator::new(fixtures::orchestrator_config(2), transport.clone(), status.clone())
//!     .start()?;
//! ```

mod mock_status_client;
mod mock_transport;

pub use mock_status_client::MockStatusClient;
pub use mock_transport::{MockBehavior, MockUploadTransport};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::orchestrator::OrchestratorConfig;
    use crate::slot::{FileHandle, PreviousUpload, UploadState};

    pub const MIB: u64 = 1024 * 1024;
    pub const GIB: u64 = 1024 * MIB;

    /// A file handle that is never read (mock transports only).
    pub fn video(name: &str, size: u64) -> FileHandle {
        FileHandle::new(format!("/videos/{}", name), size)
    }

    /// Orchestrator config with a short poll interval.
    pub fn orchestrator_config(limit: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            concurrent_upload_limit: limit,
            status_poll_interval_ms: 20,
            ..OrchestratorConfig::default()
        }
    }

    pub fn previous_upload(video_id: &str, file_name: &str, state: UploadState) -> PreviousUpload {
        PreviousUpload {
            video_id: video_id.to_string(),
            file_name: file_name.to_string(),
            state,
            encodings: BTreeMap::new(),
            file_size: Some(100 * MIB),
            error: None,
        }
    }
}
