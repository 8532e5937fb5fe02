use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::slot::{FileHandle, SlotId, UploadSlot};

use super::runner::Command;
use super::{EnqueueOutcome, OrchestratorError, UploadsSnapshot};

/// Handle for talking to a running orchestrator.
///
/// This is cheaply cloneable and can be shared across tasks. Commands are
/// applied in the order they reach the control loop.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<UploadsSnapshot>,
    running: Arc<AtomicBool>,
}

impl OrchestratorHandle {
    pub(super) fn new(
        commands: mpsc::Sender<Command>,
        snapshots: watch::Receiver<UploadsSnapshot>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            commands,
            snapshots,
            running,
        }
    }

    /// Validate and queue files. Rejected files never get a slot.
    pub async fn enqueue(&self, files: Vec<FileHandle>) -> Result<EnqueueOutcome, OrchestratorError> {
        self.request(|reply| Command::Enqueue { files, reply }).await
    }

    /// Cancel a queued or uploading slot.
    ///
    /// When this returns, the slot is `Cancelled` and its permit (if any)
    /// is back in the gate. Returns the cancelled slot.
    pub async fn cancel(&self, slot_id: SlotId) -> Result<UploadSlot, OrchestratorError> {
        self.request(|reply| Command::Cancel { slot_id, reply })
            .await?
    }

    /// Latest published read model.
    pub fn snapshot(&self) -> UploadsSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<UploadsSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the control loop, cancelling in-flight and queued transfers.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        if self
            .request(|reply| Command::Shutdown { reply })
            .await
            .is_err()
        {
            debug!("Orchestrator already stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| OrchestratorError::ShutDown)?;
        rx.await.map_err(|_| OrchestratorError::ShutDown)
    }
}
