//! Types for upload slots.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when a slot operation would break the slot lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// The requested state change is not a forward lifecycle edge.
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: UploadState, to: UploadState },

    /// A server-assigned video ID may never change once set.
    #[error("video id already assigned: {existing}")]
    VideoIdAlreadyAssigned { existing: String },

    /// Previous uploads can only be seeded in a server-side state.
    #[error("previous upload {video_id} cannot be seeded in state {state}")]
    InvalidSeedState { video_id: String, state: UploadState },
}

/// Locally generated slot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(Uuid);

impl SlotId {
    /// Generate a fresh identifier. v4 UUIDs are never reused within a session.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SlotId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of an upload slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// Waiting for a concurrency permit.
    Queued,
    /// Bytes are being streamed to the submission endpoint.
    Uploading,
    /// Accepted by the server, transcoding in progress.
    Processing,
    /// Transcoding finished, encodings available.
    Ready,
    /// Transfer or transcoding failed.
    Failed,
    /// Cancelled by the user before the transfer finished.
    Cancelled,
}

impl UploadState {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Queued => "queued",
            UploadState::Uploading => "uploading",
            UploadState::Processing => "processing",
            UploadState::Ready => "ready",
            UploadState::Failed => "failed",
            UploadState::Cancelled => "cancelled",
        }
    }

    /// Ready, Failed and Cancelled admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Ready | UploadState::Failed | UploadState::Cancelled
        )
    }

    /// Whether the user may still cancel a slot in this state.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, UploadState::Queued | UploadState::Uploading)
    }

    /// Forward edges of the lifecycle graph.
    pub fn can_transition_to(&self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Queued, Uploading)
                | (Queued, Cancelled)
                | (Uploading, Processing)
                | (Uploading, Failed)
                | (Uploading, Cancelled)
                | (Processing, Ready)
                | (Processing, Failed)
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified cause of a slot failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadErrorKind {
    /// Connection-level failure while transferring.
    NetworkError,
    /// The submission endpoint declined the file.
    ServerRejected,
    /// The transfer did not finish in time.
    Timeout,
    /// The server reported that transcoding failed.
    ProcessingFailed,
}

impl UploadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadErrorKind::NetworkError => "network_error",
            UploadErrorKind::ServerRejected => "server_rejected",
            UploadErrorKind::Timeout => "timeout",
            UploadErrorKind::ProcessingFailed => "processing_failed",
        }
    }
}

/// Failure detail attached to a `Failed` slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: UploadErrorKind,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(kind: UploadErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Immutable description of a local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHandle {
    #[serde(skip)]
    path: PathBuf,
    name: String,
    size: u64,
    mime_type: String,
}

impl FileHandle {
    /// Build a handle from already-known metadata.
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_for_name(&name).to_string();
        Self {
            path,
            name,
            size,
            mime_type,
        }
    }

    /// Build a handle from filesystem metadata.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        Ok(Self::new(path, metadata.len()))
    }

    /// Handle for a file known only by name (seeded previous uploads).
    pub(crate) fn detached(name: &str, size: u64) -> Self {
        Self {
            path: PathBuf::new(),
            name: name.to_string(),
            size,
            mime_type: mime_for_name(name).to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Lowercased extension without the leading dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// MIME type derived from a file name's extension.
pub fn mime_for_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mpg" | "mpeg" => "video/mpeg",
        "ogv" => "video/ogg",
        _ => "application/octet-stream",
    }
}

/// A record from the previous-uploads snapshot handed over at page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousUpload {
    pub video_id: String,
    pub file_name: String,
    pub state: UploadState,
    #[serde(default)]
    pub encodings: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Server-reported failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use UploadState::*;
        assert!(Queued.can_transition_to(Uploading));
        assert!(Uploading.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Ready));
        assert!(Processing.can_transition_to(Failed));
        assert!(Uploading.can_transition_to(Failed));
    }

    #[test]
    fn test_cancel_only_before_processing() {
        use UploadState::*;
        assert!(Queued.can_transition_to(Cancelled));
        assert!(Uploading.can_transition_to(Cancelled));
        assert!(!Processing.can_transition_to(Cancelled));
        assert!(!Ready.can_transition_to(Cancelled));
    }

    #[test]
    fn test_no_backward_or_terminal_transitions() {
        use UploadState::*;
        let all = [Queued, Uploading, Processing, Ready, Failed, Cancelled];
        for terminal in [Ready, Failed, Cancelled] {
            for next in all {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
        assert!(!Processing.can_transition_to(Uploading));
        assert!(!Uploading.can_transition_to(Queued));
        assert!(!Queued.can_transition_to(Processing));
        assert!(!Queued.can_transition_to(Failed));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&UploadState::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert_eq!(UploadState::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_file_handle_metadata() {
        let file = FileHandle::new("/tmp/Lecture 01.MOV", 1024);
        assert_eq!(file.name(), "Lecture 01.MOV");
        assert_eq!(file.size(), 1024);
        assert_eq!(file.mime_type(), "video/quicktime");
        assert_eq!(file.extension().as_deref(), Some("mov"));
    }

    #[test]
    fn test_file_handle_without_extension() {
        let file = FileHandle::new("/tmp/README", 10);
        assert_eq!(file.extension(), None);
        assert_eq!(file.mime_type(), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_file_handle_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intro.mp4");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let file = FileHandle::from_path(&path).await.unwrap();
        assert_eq!(file.name(), "intro.mp4");
        assert_eq!(file.size(), 4096);
        assert_eq!(file.mime_type(), "video/mp4");
        assert_eq!(file.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_file_handle_from_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileHandle::from_path(dir.path()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_slot_id_roundtrip() {
        let id = SlotId::new();
        let parsed: SlotId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_ne!(SlotId::new(), SlotId::new());
    }

    #[test]
    fn test_previous_upload_deserialize_defaults() {
        let json = r#"{"video_id": "v1", "file_name": "a.mp4", "state": "processing"}"#;
        let record: PreviousUpload = serde_json::from_str(json).unwrap();
        assert_eq!(record.state, UploadState::Processing);
        assert!(record.encodings.is_empty());
        assert!(record.file_size.is_none());
        assert!(record.error.is_none());
    }
}
