//! Mock status client for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::status::{RemoteStatus, StatusClient, StatusError};

/// Mock implementation of the StatusClient trait.
///
/// Ids without a configured status are omitted from responses, which the
/// poller treats as still processing.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockStatusClient::new();
/// client.set_ready("v1", &["desktop_mp4"]).await;
/// client.fail_next(2).await; // next two queries error
/// ```
#[derive(Debug, Default)]
pub struct MockStatusClient {
    statuses: Arc<RwLock<HashMap<String, RemoteStatus>>>,
    queries: Arc<RwLock<Vec<Vec<String>>>>,
    failures_remaining: Arc<RwLock<u32>>,
}

impl MockStatusClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_status(&self, video_id: &str, status: RemoteStatus) {
        self.statuses
            .write()
            .await
            .insert(video_id.to_string(), status);
    }

    /// Report `video_id` ready with the given formats available.
    pub async fn set_ready(&self, video_id: &str, formats: &[&str]) {
        let encodings: BTreeMap<String, bool> =
            formats.iter().map(|f| (f.to_string(), true)).collect();
        self.set_status(video_id, RemoteStatus::ready(encodings)).await;
    }

    pub async fn set_failed(&self, video_id: &str, reason: &str) {
        self.set_status(video_id, RemoteStatus::failed(reason)).await;
    }

    /// Make the next `count` queries fail.
    pub async fn fail_next(&self, count: u32) {
        *self.failures_remaining.write().await = count;
    }

    /// Id batches received, one entry per query.
    pub async fn queries(&self) -> Vec<Vec<String>> {
        self.queries.read().await.clone()
    }

    pub async fn query_count(&self) -> usize {
        self.queries.read().await.len()
    }
}

#[async_trait]
impl StatusClient for MockStatusClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn query(
        &self,
        video_ids: &[String],
    ) -> Result<HashMap<String, RemoteStatus>, StatusError> {
        self.queries.write().await.push(video_ids.to_vec());

        {
            let mut failures = self.failures_remaining.write().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(StatusError::ConnectionFailed("mock failure".to_string()));
            }
        }

        let statuses = self.statuses.read().await;
        Ok(video_ids
            .iter()
            .filter_map(|id| statuses.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }
}
