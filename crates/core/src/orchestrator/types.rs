//! Types for the upload orchestrator.

use serde::Serialize;
use thiserror::Error;

use crate::gate::GateError;
use crate::slot::{SlotError, SlotId, UploadSlot, UploadState};

/// Why a selected file never entered the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("file is {size} bytes, over the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("unsupported file format: {}", extension.as_deref().unwrap_or("none"))]
    UnsupportedFormat { extension: Option<String> },
}

impl ValidationError {
    /// Stable identifier for API responses and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::FileTooLarge { .. } => "file_too_large",
            ValidationError::UnsupportedFormat { .. } => "unsupported_format",
        }
    }
}

/// Errors returned by orchestrator commands.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No slot with this id exists.
    #[error("slot not found: {0}")]
    SlotNotFound(SlotId),

    /// Only queued or uploading slots can be cancelled.
    #[error("slot {slot_id} cannot be cancelled in state {state}")]
    NotCancellable { slot_id: SlotId, state: UploadState },

    /// Settings the control loop cannot run with.
    #[error("invalid orchestrator config: {0}")]
    InvalidConfig(String),

    /// The control loop has stopped.
    #[error("orchestrator is shut down")]
    ShutDown,

    #[error("slot error: {0}")]
    Slot(#[from] SlotError),

    #[error("concurrency gate error: {0}")]
    Gate(#[from] GateError),
}

/// A file turned away by `enqueue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFile {
    pub file_name: String,
    pub error: ValidationError,
}

/// Result of one `enqueue` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnqueueOutcome {
    /// New slots, in the order the files were given.
    pub accepted: Vec<SlotId>,
    pub rejected: Vec<RejectedFile>,
}

/// Immutable read model of every slot.
///
/// `active` holds queued, uploading and processing slots; `previous` holds
/// ready, failed and cancelled ones. Both keep creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadsSnapshot {
    pub active: Vec<UploadSlot>,
    pub previous: Vec<UploadSlot>,
    pub concurrent_upload_limit: usize,
    /// Slots currently in `Uploading`.
    pub uploading: usize,
}

impl UploadsSnapshot {
    pub(crate) fn build<'a>(
        slots: impl IntoIterator<Item = &'a UploadSlot>,
        concurrent_upload_limit: usize,
    ) -> Self {
        let mut snapshot = Self {
            concurrent_upload_limit,
            ..Self::default()
        };
        for slot in slots {
            if slot.state() == UploadState::Uploading {
                snapshot.uploading += 1;
            }
            if slot.state().is_terminal() {
                snapshot.previous.push(slot.clone());
            } else {
                snapshot.active.push(slot.clone());
            }
        }
        snapshot
    }

    /// Every slot, active first.
    pub fn iter(&self) -> impl Iterator<Item = &UploadSlot> {
        self.active.iter().chain(self.previous.iter())
    }

    pub fn get(&self, slot_id: SlotId) -> Option<&UploadSlot> {
        self.iter().find(|s| s.id() == slot_id)
    }

    pub fn find_by_video_id(&self, video_id: &str) -> Option<&UploadSlot> {
        self.iter().find(|s| s.video_id() == Some(video_id))
    }

    pub fn count(&self, state: UploadState) -> usize {
        self.iter().filter(|s| s.state() == state).count()
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
