//! Mock upload transport for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{oneshot, RwLock};
use tokio_util::sync::CancellationToken;

use crate::slot::FileHandle;
use crate::transport::{ProgressReporter, TransportError, UploadAccepted, UploadTransport};

type TransferResult = Result<UploadAccepted, TransportError>;

/// How the mock answers an upload.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Report full progress and accept with `vid-<file name>`.
    Accept,
    /// Report full progress and accept with this id.
    AcceptAs(String),
    /// Fail immediately.
    Fail(TransportError),
    /// Report a quarter of the file, then wait for `release` or cancel.
    Hold,
}

#[derive(Default)]
struct HoldState {
    waiting: HashMap<String, oneshot::Sender<TransferResult>>,
    /// Results released before the transfer started.
    early: HashMap<String, TransferResult>,
}

/// Mock implementation of the UploadTransport trait.
///
/// Provides controllable behavior for testing:
/// - Record every upload call in order
/// - Script per-file outcomes, or hold transfers open until released
/// - Track concurrency and cancellations
///
/// # Example
///
/// ```rust,ignore
/// let transport = MockUploadTransport::holding();
/// // ... enqueue "a.mp4" ...
/// transport.release_success("a.mp4", "v1").await;
/// assert_eq!(transport.calls().await, vec!["a.mp4"]);
/// ```
pub struct MockUploadTransport {
    default: MockBehavior,
    scripted: Arc<RwLock<HashMap<String, MockBehavior>>>,
    calls: Arc<RwLock<Vec<String>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
    holds: Arc<RwLock<HoldState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockUploadTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs however the transfer ends, including when its future is dropped.
struct InFlightGuard {
    file_name: String,
    in_flight: Arc<AtomicUsize>,
    cancel: CancellationToken,
    cancelled: Arc<Mutex<Vec<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.cancel.is_cancelled() {
            if let Ok(mut cancelled) = self.cancelled.lock() {
                cancelled.push(std::mem::take(&mut self.file_name));
            }
        }
    }
}

impl MockUploadTransport {
    /// Accept every upload immediately.
    pub fn new() -> Self {
        Self::with_default(MockBehavior::Accept)
    }

    /// Hold every upload open until released.
    pub fn holding() -> Self {
        Self::with_default(MockBehavior::Hold)
    }

    pub fn with_default(default: MockBehavior) -> Self {
        Self {
            default,
            scripted: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            cancelled: Arc::new(Mutex::new(Vec::new())),
            holds: Arc::new(RwLock::new(HoldState::default())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Override the behavior for one file name.
    pub async fn script(&self, file_name: &str, behavior: MockBehavior) {
        self.scripted
            .write()
            .await
            .insert(file_name.to_string(), behavior);
    }

    /// Finish a held transfer successfully.
    pub async fn release_success(&self, file_name: &str, video_id: &str) {
        self.release(
            file_name,
            Ok(UploadAccepted {
                video_id: video_id.to_string(),
            }),
        )
        .await;
    }

    /// Finish a held transfer with an error.
    pub async fn release_failure(&self, file_name: &str, error: TransportError) {
        self.release(file_name, Err(error)).await;
    }

    async fn release(&self, file_name: &str, result: TransferResult) {
        let mut holds = self.holds.write().await;
        match holds.waiting.remove(file_name) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => {
                holds.early.insert(file_name.to_string(), result);
            }
        }
    }

    /// File names passed to `upload`, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// File names whose transfer ended after cancellation.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Transfers currently inside `upload`.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous transfers seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn behavior_for(&self, file_name: &str) -> MockBehavior {
        self.scripted
            .read()
            .await
            .get(file_name)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    async fn wait_for_release(&self, file: &FileHandle) -> oneshot::Receiver<TransferResult> {
        let (tx, rx) = oneshot::channel();
        let mut holds = self.holds.write().await;
        match holds.early.remove(file.name()) {
            Some(result) => {
                let _ = tx.send(result);
            }
            None => {
                holds.waiting.insert(file.name().to_string(), tx);
            }
        }
        rx
    }
}

#[async_trait]
impl UploadTransport for MockUploadTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(
        &self,
        file: &FileHandle,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<UploadAccepted, TransportError> {
        self.calls.write().await.push(file.name().to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard {
            file_name: file.name().to_string(),
            in_flight: Arc::clone(&self.in_flight),
            cancel: cancel.clone(),
            cancelled: Arc::clone(&self.cancelled),
        };

        match self.behavior_for(file.name()).await {
            MockBehavior::Accept => {
                progress.report(file.size() / 2);
                progress.report(file.size());
                Ok(UploadAccepted {
                    video_id: format!("vid-{}", file.name()),
                })
            }
            MockBehavior::AcceptAs(video_id) => {
                progress.report(file.size());
                Ok(UploadAccepted { video_id })
            }
            MockBehavior::Fail(error) => Err(error),
            MockBehavior::Hold => {
                progress.report(file.size() / 4);
                let release = self.wait_for_release(file).await;
                tokio::select! {
                    _ = cancel.cancelled() => {
                        self.holds.write().await.waiting.remove(file.name());
                        Err(TransportError::Cancelled)
                    }
                    result = release => {
                        let result = result.unwrap_or(Err(TransportError::Cancelled));
                        if result.is_ok() {
                            progress.report(file.size());
                        }
                        result
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accept_reports_progress() {
        let transport = MockUploadTransport::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(move |b| sink.lock().unwrap().push(b));

        let file = FileHandle::new("/v/a.mp4", 100);
        let accepted = transport
            .upload(&file, reporter, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(accepted.video_id, "vid-a.mp4");
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
        assert_eq!(transport.calls().await, vec!["a.mp4"]);
        assert_eq!(transport.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_release_before_start() {
        let transport = MockUploadTransport::holding();
        transport.release_success("a.mp4", "v1").await;

        let file = FileHandle::new("/v/a.mp4", 100);
        let accepted = transport
            .upload(&file, ProgressReporter::noop(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(accepted.video_id, "v1");
    }

    #[tokio::test]
    async fn test_hold_until_cancelled() {
        let transport = Arc::new(MockUploadTransport::holding());
        let cancel = CancellationToken::new();

        let task = {
            let transport = Arc::clone(&transport);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let file = FileHandle::new("/v/a.mp4", 100);
                transport
                    .upload(&file, ProgressReporter::noop(), cancel)
                    .await
            })
        };

        while transport.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        assert_eq!(task.await.unwrap().unwrap_err(), TransportError::Cancelled);
        assert_eq!(transport.cancelled(), vec!["a.mp4"]);
        assert_eq!(transport.in_flight(), 0);
    }
}
