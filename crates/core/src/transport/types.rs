//! Types for upload transport operations.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slot::UploadErrorKind;

/// Errors that can occur while transferring a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Upload rejected: {reason}")]
    Rejected { status: Option<u16>, reason: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Upload cancelled")]
    Cancelled,
}

impl TransportError {
    /// Map to the failure kind recorded on a slot.
    ///
    /// `Cancelled` has no failure kind: a cancelled slot is not failed.
    pub fn classify(&self) -> Option<UploadErrorKind> {
        match self {
            TransportError::ConnectionFailed(_) | TransportError::FileRead(_) => {
                Some(UploadErrorKind::NetworkError)
            }
            TransportError::Timeout => Some(UploadErrorKind::Timeout),
            TransportError::Rejected { .. } | TransportError::InvalidResponse(_) => {
                Some(UploadErrorKind::ServerRejected)
            }
            TransportError::Cancelled => None,
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            TransportError::InvalidResponse(e.to_string())
        } else {
            TransportError::ConnectionFailed(e.to_string())
        }
    }
}

/// The submission endpoint's acknowledgement of a complete file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAccepted {
    pub video_id: String,
}

/// Callback receiving the cumulative bytes sent for one transfer.
#[derive(Clone)]
pub struct ProgressReporter(Arc<dyn Fn(u64) + Send + Sync>);

impl ProgressReporter {
    pub fn new(f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// A reporter that discards progress.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, bytes_sent: u64) {
        (self.0)(bytes_sent)
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressReporter")
    }
}
