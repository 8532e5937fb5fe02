use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::slot::FileHandle;

use super::{ProgressReporter, TransportError, UploadAccepted};

/// Sends one file to the submission endpoint.
///
/// Implementations must call `progress` with the cumulative number of bytes
/// sent, and must return `TransportError::Cancelled` promptly once `cancel`
/// fires, releasing any connection they hold.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Transfer the file and return the server-assigned video id.
    async fn upload(
        &self,
        file: &FileHandle,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<UploadAccepted, TransportError>;
}
