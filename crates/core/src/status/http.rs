//! HTTP client for the encodings status endpoint.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TransportConfig;

use super::{RemoteState, RemoteStatus, StatusClient, StatusError};

/// Status queries never need the long transfer timeout.
const MAX_QUERY_TIMEOUT_SECS: u64 = 60;

/// Posts `{"video_ids": [...]}` and reads back `{"videos": [...]}`.
pub struct HttpStatusClient {
    client: Client,
    status_url: String,
}

#[derive(Debug, Serialize)]
struct StatusQuery<'a> {
    video_ids: &'a [String],
}

/// Entries are decoded one by one so a single odd record cannot sink the batch.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    videos: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VideoStatus {
    #[serde(alias = "edx_video_id")]
    video_id: String,
    status: String,
    #[serde(default)]
    encodings: BTreeMap<String, bool>,
    #[serde(default)]
    error: Option<String>,
}

impl From<VideoStatus> for RemoteStatus {
    fn from(video: VideoStatus) -> Self {
        let state = RemoteState::from_wire(&video.status);
        let reason = match state {
            RemoteState::Failed => Some(video.error.unwrap_or(video.status)),
            _ => None,
        };
        RemoteStatus {
            state,
            encodings: video.encodings,
            reason,
        }
    }
}

impl HttpStatusClient {
    pub fn new(status_url: impl Into<String>, config: &TransportConfig) -> Result<Self, StatusError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(
                config.request_timeout_secs.min(MAX_QUERY_TIMEOUT_SECS),
            ))
            .build()
            .map_err(|e| StatusError::ConnectionFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            status_url: status_url.into(),
        })
    }
}

#[async_trait]
impl StatusClient for HttpStatusClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn query(
        &self,
        video_ids: &[String],
    ) -> Result<HashMap<String, RemoteStatus>, StatusError> {
        debug!(count = video_ids.len(), url = %self.status_url, "Querying status");

        let response = self
            .client
            .post(&self.status_url)
            .json(&StatusQuery { video_ids })
            .send()
            .await
            .map_err(StatusError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StatusError::ApiError {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| StatusError::InvalidResponse(e.to_string()))?;

        let mut statuses = HashMap::with_capacity(body.videos.len());
        for entry in body.videos {
            match serde_json::from_value::<VideoStatus>(entry) {
                Ok(video) => {
                    statuses.insert(video.video_id.clone(), RemoteStatus::from(video));
                }
                // Left out of the result, so the id stays tracked as processing.
                Err(e) => warn!("Skipping malformed status entry: {}", e),
            }
        }
        Ok(statuses)
    }
}
