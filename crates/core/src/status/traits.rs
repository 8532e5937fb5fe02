use std::collections::HashMap;

use async_trait::async_trait;

use super::{RemoteStatus, StatusError};

/// Batched status lookup against the encodings endpoint.
#[async_trait]
pub trait StatusClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Query every id in one request.
    ///
    /// Ids the server does not mention are absent from the returned map.
    async fn query(
        &self,
        video_ids: &[String],
    ) -> Result<HashMap<String, RemoteStatus>, StatusError>;
}
