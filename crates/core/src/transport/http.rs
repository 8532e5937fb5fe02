//! HTTP multipart upload transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::slot::FileHandle;

use super::{ProgressReporter, TransportError, UploadAccepted, UploadTransport};

/// Multipart field carrying the file body.
const FILE_FIELD: &str = "file";

/// Streams files to the submission endpoint as `multipart/form-data`.
pub struct HttpUploadTransport {
    client: Client,
    submit_url: String,
    chunk_size: usize,
}

/// Successful submission response.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(alias = "edx_video_id")]
    video_id: String,
}

/// Error body returned alongside a non-2xx status.
#[derive(Debug, Deserialize)]
struct RejectionBody {
    #[serde(alias = "message")]
    error: Option<String>,
}

impl HttpUploadTransport {
    /// Create a transport posting to `submit_url`.
    pub fn new(
        submit_url: impl Into<String>,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            submit_url: submit_url.into(),
            chunk_size: config.chunk_size_bytes.max(1),
        })
    }

    async fn send(
        &self,
        file: &FileHandle,
        progress: ProgressReporter,
    ) -> Result<UploadAccepted, TransportError> {
        let reader = tokio::fs::File::open(file.path()).await.map_err(|e| {
            TransportError::FileRead(format!("{}: {}", file.path().display(), e))
        })?;

        let sent = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sent);
        let reporter = progress.clone();
        let stream = ReaderStream::with_capacity(reader, self.chunk_size).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                let len = bytes.len() as u64;
                let total = counter.fetch_add(len, Ordering::Relaxed) + len;
                reporter.report(total);
            }
            chunk
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), file.size())
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())
            .map_err(|e| TransportError::FileRead(format!("invalid mime type: {e}")))?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(&self.submit_url)
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<RejectionBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("HTTP {}", status));
            warn!(file = %file.name(), status = %status, reason = %reason, "Upload rejected");
            return Err(TransportError::Rejected {
                status: Some(status.as_u16()),
                reason,
            });
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        if body.video_id.is_empty() {
            return Err(TransportError::InvalidResponse(
                "empty video id in response".to_string(),
            ));
        }

        // The server may answer before the last chunk is polled; acceptance
        // means it holds the whole file.
        if sent.load(Ordering::Relaxed) < file.size() {
            progress.report(file.size());
        }

        Ok(UploadAccepted {
            video_id: body.video_id,
        })
    }
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(
        &self,
        file: &FileHandle,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<UploadAccepted, TransportError> {
        debug!(file = %file.name(), size = file.size(), url = %self.submit_url, "Starting transfer");

        // Dropping the request future aborts the connection.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(file = %file.name(), "Transfer aborted");
                Err(TransportError::Cancelled)
            }
            result = self.send(file, progress) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::UploadErrorKind;
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tempfile::TempDir;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/upload", addr)
    }

    async fn drain(mut multipart: Multipart) -> (String, usize) {
        let mut name = String::new();
        let mut total = 0;
        while let Some(field) = multipart.next_field().await.unwrap() {
            name = field.file_name().unwrap_or_default().to_string();
            total += field.bytes().await.unwrap().len();
        }
        (name, total)
    }

    async fn accept(multipart: Multipart) -> Json<Value> {
        let (name, total) = drain(multipart).await;
        Json(json!({ "video_id": format!("{}:{}", name, total) }))
    }

    async fn reject(multipart: Multipart) -> (StatusCode, Json<Value>) {
        drain(multipart).await;
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported codec" })),
        )
    }

    async fn stall() -> Json<Value> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Json(json!({ "video_id": "late" }))
    }

    fn write_file(dir: &TempDir, name: &str, size: usize) -> FileHandle {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![7u8; size]).unwrap();
        FileHandle::new(path, size as u64)
    }

    fn config() -> TransportConfig {
        TransportConfig {
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            chunk_size_bytes: 64 * 1024,
        }
    }

    #[tokio::test]
    async fn test_upload_success_reports_progress() {
        let url = spawn_server(Router::new().route("/upload", post(accept))).await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "lecture.mp4", 300 * 1024);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(move |b| sink.lock().unwrap().push(b));

        let transport = HttpUploadTransport::new(url, &config()).unwrap();
        let accepted = transport
            .upload(&file, reporter, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(accepted.video_id, format!("lecture.mp4:{}", 300 * 1024));
        let seen = seen.lock().unwrap();
        assert!(seen.len() > 1);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*seen.last().unwrap(), 300 * 1024);
    }

    #[tokio::test]
    async fn test_acceptance_without_reading_body_reports_full_size() {
        async fn accept_unread() -> Json<Value> {
            Json(json!({ "video_id": "early" }))
        }

        let url = spawn_server(Router::new().route("/upload", post(accept_unread))).await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "talk.mov", 16 * 1024);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(move |b| sink.lock().unwrap().push(b));

        let transport = HttpUploadTransport::new(url, &config()).unwrap();
        let accepted = transport
            .upload(&file, reporter, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(accepted.video_id, "early");
        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*seen.last().unwrap(), 16 * 1024);
    }

    #[tokio::test]
    async fn test_upload_rejected_carries_reason() {
        let url = spawn_server(Router::new().route("/upload", post(reject))).await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "clip.mov", 1024);

        let transport = HttpUploadTransport::new(url, &config()).unwrap();
        let err = transport
            .upload(&file, ProgressReporter::noop(), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Rejected {
                status: Some(400),
                reason: "unsupported codec".to_string()
            }
        );
        assert_eq!(err.classify(), Some(UploadErrorKind::ServerRejected));
    }

    #[tokio::test]
    async fn test_upload_cancel_aborts_promptly() {
        let url = spawn_server(Router::new().route("/upload", post(stall))).await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "clip.mp4", 1024);

        let transport = HttpUploadTransport::new(url, &config()).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            transport.upload(&file, ProgressReporter::noop(), cancel),
        )
        .await
        .expect("cancel should abort the transfer");
        assert_eq!(result.unwrap_err(), TransportError::Cancelled);
    }

    #[tokio::test]
    async fn test_upload_times_out() {
        let url = spawn_server(Router::new().route("/upload", post(stall))).await;
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "clip.mp4", 1024);

        let config = TransportConfig {
            request_timeout_secs: 1,
            ..config()
        };
        let transport = HttpUploadTransport::new(url, &config).unwrap();
        let err = transport
            .upload(&file, ProgressReporter::noop(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout);
        assert_eq!(err.classify(), Some(UploadErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_upload_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "clip.mp4", 1024);
        let transport =
            HttpUploadTransport::new(format!("http://{}/upload", addr), &config()).unwrap();
        let err = transport
            .upload(&file, ProgressReporter::noop(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.classify(), Some(UploadErrorKind::NetworkError));
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let transport = HttpUploadTransport::new("http://127.0.0.1:9/upload", &config()).unwrap();
        let file = FileHandle::new("/nonexistent/clip.mp4", 10);
        let err = transport
            .upload(&file, ProgressReporter::noop(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::FileRead(_)));
    }
}
