use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use vidup_core::{
    EnqueueOutcome, FileHandle, OrchestratorError, SlotId, UploadSlot, UploadsSnapshot,
};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for queueing local files.
#[derive(Debug, Deserialize)]
pub struct EnqueueBody {
    pub paths: Vec<PathBuf>,
}

/// A path that could not be opened, so never reached validation.
#[derive(Debug, Serialize)]
pub struct UnreadablePath {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    #[serde(flatten)]
    pub outcome: EnqueueOutcome,
    pub unreadable: Vec<UnreadablePath>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct UploadErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<UploadErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(UploadErrorResponse {
            error: error.into(),
        }),
    )
}

fn orchestrator_error(e: OrchestratorError) -> ApiError {
    let status = match &e {
        OrchestratorError::SlotNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::NotCancellable { .. } => StatusCode::CONFLICT,
        OrchestratorError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::Slot(_)
        | OrchestratorError::Gate(_)
        | OrchestratorError::InvalidConfig(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// Current read model: active and previous uploads.
pub async fn list_uploads(State(state): State<Arc<AppState>>) -> Json<UploadsSnapshot> {
    Json(state.orchestrator().snapshot())
}

/// Queue local files for upload.
pub async fn enqueue_uploads(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EnqueueBody>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    if body.paths.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "no paths given"));
    }

    let mut files = Vec::with_capacity(body.paths.len());
    let mut unreadable = Vec::new();
    for path in body.paths {
        match FileHandle::from_path(&path).await {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!("Cannot open {:?}: {}", path, e);
                unreadable.push(UnreadablePath {
                    path: path.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    let outcome = if files.is_empty() {
        EnqueueOutcome::default()
    } else {
        state
            .orchestrator()
            .enqueue(files)
            .await
            .map_err(orchestrator_error)?
    };
    debug!(
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        unreadable = unreadable.len(),
        "Enqueue request handled"
    );

    Ok(Json(EnqueueResponse {
        outcome,
        unreadable,
    }))
}

/// Cancel a queued or uploading slot.
pub async fn cancel_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UploadSlot>, ApiError> {
    let slot_id: SlotId = id
        .parse()
        .map_err(|_| api_error(StatusCode::NOT_FOUND, format!("Upload not found: {}", id)))?;

    state
        .orchestrator()
        .cancel(slot_id)
        .await
        .map(Json)
        .map_err(orchestrator_error)
}
