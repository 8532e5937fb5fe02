//! The upload slot state machine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{
    ErrorDetail, FileHandle, PreviousUpload, SlotError, SlotId, UploadErrorKind, UploadState,
};

/// One file committed to upload, tracked from selection to a terminal state.
///
/// Mutators enforce the lifecycle: states only move forward along
/// `Queued -> Uploading -> Processing -> {Ready | Failed}`, with `Cancelled`
/// reachable from `Queued` or `Uploading`. Byte progress never decreases and
/// never exceeds the file size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSlot {
    id: SlotId,
    file: FileHandle,
    state: UploadState,
    progress_bytes: u64,
    total_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,
    encodings: BTreeMap<String, bool>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UploadSlot {
    /// A freshly selected file, waiting for admission.
    pub fn queued(file: FileHandle) -> Self {
        let now = Utc::now();
        Self {
            id: SlotId::new(),
            total_bytes: file.size(),
            file,
            state: UploadState::Queued,
            progress_bytes: 0,
            video_id: None,
            error: None,
            encodings: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A slot discovered among previously submitted uploads.
    pub fn from_previous(record: &PreviousUpload) -> Result<Self, SlotError> {
        let (error, encodings) = match record.state {
            UploadState::Processing => (None, BTreeMap::new()),
            UploadState::Ready => (None, record.encodings.clone()),
            UploadState::Failed => (
                Some(ErrorDetail::new(
                    UploadErrorKind::ProcessingFailed,
                    record
                        .error
                        .clone()
                        .unwrap_or_else(|| "processing failed".to_string()),
                )),
                BTreeMap::new(),
            ),
            state => {
                return Err(SlotError::InvalidSeedState {
                    video_id: record.video_id.clone(),
                    state,
                })
            }
        };

        let size = record.file_size.unwrap_or(0);
        let now = Utc::now();
        Ok(Self {
            id: SlotId::new(),
            file: FileHandle::detached(&record.file_name, size),
            state: record.state,
            progress_bytes: size,
            total_bytes: size,
            video_id: Some(record.video_id.clone()),
            error,
            encodings,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn progress_bytes(&self) -> u64 {
        self.progress_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    pub fn error(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    pub fn encodings(&self) -> &BTreeMap<String, bool> {
        &self.encodings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Queued -> Uploading.
    pub fn start_upload(&mut self) -> Result<(), SlotError> {
        self.transition(UploadState::Uploading)
    }

    /// Record bytes sent so far. Returns true when the visible progress moved.
    ///
    /// Ignored outside `Uploading`; regressions are dropped and overshoot is
    /// clamped to the file size.
    pub fn record_progress(&mut self, bytes_sent: u64) -> bool {
        if self.state != UploadState::Uploading {
            return false;
        }
        let bytes = bytes_sent.min(self.total_bytes);
        if bytes <= self.progress_bytes {
            return false;
        }
        self.progress_bytes = bytes;
        self.updated_at = Utc::now();
        true
    }

    /// Uploading -> Processing, once the server accepted the whole file.
    ///
    /// Acceptance implies every byte arrived, so progress is set to the file
    /// size even if the last progress report never got through.
    pub fn finish_upload(&mut self, video_id: impl Into<String>) -> Result<(), SlotError> {
        if !self.state.can_transition_to(UploadState::Processing) {
            return Err(SlotError::IllegalTransition {
                from: self.state,
                to: UploadState::Processing,
            });
        }
        let video_id = video_id.into();
        match &self.video_id {
            Some(existing) if *existing != video_id => {
                return Err(SlotError::VideoIdAlreadyAssigned {
                    existing: existing.clone(),
                })
            }
            _ => {}
        }
        self.progress_bytes = self.total_bytes;
        self.video_id = Some(video_id);
        self.transition(UploadState::Processing)
    }

    /// Processing -> Ready with per-format availability.
    pub fn mark_ready(&mut self, encodings: BTreeMap<String, bool>) -> Result<(), SlotError> {
        self.transition(UploadState::Ready)?;
        self.encodings = encodings;
        Ok(())
    }

    /// Uploading | Processing -> Failed.
    pub fn mark_failed(&mut self, detail: ErrorDetail) -> Result<(), SlotError> {
        self.transition(UploadState::Failed)?;
        self.error = Some(detail);
        Ok(())
    }

    /// Queued | Uploading -> Cancelled.
    pub fn cancel(&mut self) -> Result<(), SlotError> {
        self.transition(UploadState::Cancelled)
    }

    fn transition(&mut self, next: UploadState) -> Result<(), SlotError> {
        if !self.state.can_transition_to(next) {
            return Err(SlotError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
