//! Types for status queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a batched status query. Always transient for the poller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl StatusError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StatusError::Timeout
        } else if e.is_decode() {
            StatusError::InvalidResponse(e.to_string())
        } else {
            StatusError::ConnectionFailed(e.to_string())
        }
    }
}

/// Server-side state of a submitted video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    Processing,
    Ready,
    Failed,
}

impl RemoteState {
    /// Normalize a status string from the transcoding pipeline.
    ///
    /// Unrecognized values count as still processing.
    pub fn from_wire(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "file_complete" | "transcript_ready" | "imported" | "ready" => RemoteState::Ready,
            "file_corrupt" | "pipeline_error" | "upload_failed" | "invalid_token" | "failed" => {
                RemoteState::Failed
            }
            _ => RemoteState::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RemoteState::Processing)
    }
}

/// Reported status for one video id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub state: RemoteState,
    /// Format name to availability, meaningful once `Ready`.
    #[serde(default)]
    pub encodings: BTreeMap<String, bool>,
    /// Raw server status or error message, kept as the failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RemoteStatus {
    pub fn processing() -> Self {
        Self {
            state: RemoteState::Processing,
            encodings: BTreeMap::new(),
            reason: None,
        }
    }

    pub fn ready(encodings: BTreeMap<String, bool>) -> Self {
        Self {
            state: RemoteState::Ready,
            encodings,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            state: RemoteState::Failed,
            encodings: BTreeMap::new(),
            reason: Some(reason.into()),
        }
    }
}
