//! Upload orchestrator implementation.
//!
//! All slot state lives in `ControlLoop`, which runs on a single task.
//! Transfers and status queries run on their own tasks and only ever send
//! events back; they never touch slots directly.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::gate::{ConcurrencyGate, GatePermit};
use crate::metrics::{
    ACTIVE_TRANSFERS, BYTES_UPLOADED, TRANSFER_DURATION, TRANSFER_FAILURES, UPLOADS_CANCELLED,
    UPLOADS_COMPLETED, UPLOADS_ENQUEUED, UPLOADS_REJECTED,
};
use crate::slot::{
    ErrorDetail, FileHandle, PreviousUpload, SlotId, UploadErrorKind, UploadSlot, UploadState,
};
use crate::status::{RemoteState, RemoteStatus, StatusClient, StatusError, StatusPoller, StatusUpdate};
use crate::transport::{ProgressReporter, TransportError, UploadAccepted, UploadTransport};

use super::config::OrchestratorConfig;
use super::handle::OrchestratorHandle;
use super::types::{EnqueueOutcome, OrchestratorError, RejectedFile, UploadsSnapshot};
use super::validate::validate_file;

/// Requests from handles to the control loop.
pub(crate) enum Command {
    Enqueue {
        files: Vec<FileHandle>,
        reply: oneshot::Sender<EnqueueOutcome>,
    },
    Cancel {
        slot_id: SlotId,
        reply: oneshot::Sender<Result<UploadSlot, OrchestratorError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Observations reported by transfer and status tasks.
enum Event {
    Progress {
        slot_id: SlotId,
        bytes_sent: u64,
    },
    TransferFinished {
        slot_id: SlotId,
        result: Result<UploadAccepted, TransportError>,
    },
    StatusReport(Result<HashMap<String, RemoteStatus>, StatusError>),
}

/// A running transfer. Dropping it releases the concurrency permit.
struct ActiveTransfer {
    cancel: CancellationToken,
    _permit: GatePermit,
    started_at: Instant,
}

/// Builds and starts the control loop.
pub struct UploadOrchestrator {
    config: OrchestratorConfig,
    transport: Arc<dyn UploadTransport>,
    status_client: Arc<dyn StatusClient>,
    previous_uploads: Vec<PreviousUpload>,
}

impl UploadOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        transport: Arc<dyn UploadTransport>,
        status_client: Arc<dyn StatusClient>,
    ) -> Self {
        Self {
            config,
            transport,
            status_client,
            previous_uploads: Vec::new(),
        }
    }

    /// Seed slots for uploads submitted in an earlier session.
    pub fn with_previous_uploads(mut self, records: Vec<PreviousUpload>) -> Self {
        self.previous_uploads = records;
        self
    }

    /// Spawn the control loop. Must be called within a Tokio runtime.
    pub fn start(self) -> Result<OrchestratorHandle, OrchestratorError> {
        let gate = ConcurrencyGate::new(self.config.concurrent_upload_limit)?;
        if self.config.status_poll_interval_ms == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "status_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));

        info!(
            transport = self.transport.name(),
            status_client = self.status_client.name(),
            limit = self.config.concurrent_upload_limit,
            "Starting upload orchestrator"
        );

        let mut control = ControlLoop {
            poller: StatusPoller::new(self.config.poll_interval()),
            config: self.config,
            transport: self.transport,
            status_client: self.status_client,
            gate,
            slots: Vec::new(),
            index: HashMap::new(),
            pending: VecDeque::new(),
            active: HashMap::new(),
            commands: command_rx,
            events_tx: event_tx,
            events_rx: event_rx,
            snapshot_tx: watch::Sender::new(UploadsSnapshot::default()),
            running: Arc::clone(&running),
        };
        control.seed(&self.previous_uploads);
        control.publish();

        let handle = OrchestratorHandle::new(command_tx, control.snapshot_tx.subscribe(), running);
        tokio::spawn(control.run());
        Ok(handle)
    }
}

struct ControlLoop {
    config: OrchestratorConfig,
    transport: Arc<dyn UploadTransport>,
    status_client: Arc<dyn StatusClient>,
    gate: ConcurrencyGate,

    // Slots in creation order, with an id index.
    slots: Vec<UploadSlot>,
    index: HashMap<SlotId, usize>,
    /// Queued slots awaiting a permit, oldest first.
    pending: VecDeque<SlotId>,
    active: HashMap<SlotId, ActiveTransfer>,
    poller: StatusPoller,

    commands: mpsc::Receiver<Command>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    snapshot_tx: watch::Sender<UploadsSnapshot>,
    running: Arc<AtomicBool>,
}

impl ControlLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        // Every handle is gone.
                        self.shutdown();
                        break;
                    };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                    self.settle();
                }
                _ = self.poller.tick() => self.start_poll(),
            }
        }
        info!("Upload orchestrator stopped");
    }

    fn seed(&mut self, records: &[PreviousUpload]) {
        let mut seen = HashSet::new();
        for record in records {
            if !seen.insert(record.video_id.as_str()) {
                warn!(video_id = %record.video_id, "Skipping duplicate previous upload");
                continue;
            }
            match UploadSlot::from_previous(record) {
                Ok(slot) => {
                    if slot.state() == UploadState::Processing {
                        self.poller.track(slot.id(), record.video_id.clone());
                    }
                    self.insert(slot);
                }
                Err(e) => warn!(error = %e, "Skipping previous upload"),
            }
        }
        if !records.is_empty() {
            info!(
                seeded = self.slots.len(),
                processing = self.poller.len(),
                "Seeded previous uploads"
            );
        }
    }

    /// Apply one command. Returns false once the loop should exit.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Enqueue { files, reply } => {
                let outcome = self.enqueue(files);
                self.settle();
                let _ = reply.send(outcome);
            }
            Command::Cancel { slot_id, reply } => {
                let result = self.cancel(slot_id);
                self.settle();
                let _ = reply.send(result);
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Progress {
                slot_id,
                bytes_sent,
            } => {
                if let Some(slot) = self.slot_mut(slot_id) {
                    if slot.record_progress(bytes_sent) {
                        debug!(slot_id = %slot_id, bytes = slot.progress_bytes(), total = slot.total_bytes(), "Upload progress");
                    }
                }
            }
            Event::TransferFinished { slot_id, result } => self.on_transfer_finished(slot_id, result),
            Event::StatusReport(result) => {
                for update in self.poller.complete_cycle(result) {
                    self.on_status_update(update);
                }
            }
        }
    }

    /// Admit what the gate allows, then publish.
    fn settle(&mut self) {
        self.admit_pending();
        self.publish();
    }

    fn enqueue(&mut self, files: Vec<FileHandle>) -> EnqueueOutcome {
        let mut outcome = EnqueueOutcome::default();
        for file in files {
            match validate_file(&file, &self.config) {
                Ok(()) => {
                    let slot = UploadSlot::queued(file);
                    let slot_id = slot.id();
                    info!(slot_id = %slot_id, file = %slot.file().name(), size = slot.total_bytes(), "Upload queued");
                    self.insert(slot);
                    self.pending.push_back(slot_id);
                    outcome.accepted.push(slot_id);
                    UPLOADS_ENQUEUED.inc();
                }
                Err(error) => {
                    info!(file = %file.name(), error = %error, "Upload rejected");
                    UPLOADS_REJECTED.with_label_values(&[error.code()]).inc();
                    outcome.rejected.push(RejectedFile {
                        file_name: file.name().to_string(),
                        error,
                    });
                }
            }
        }
        outcome
    }

    fn cancel(&mut self, slot_id: SlotId) -> Result<UploadSlot, OrchestratorError> {
        let slot = self
            .slot_mut(slot_id)
            .ok_or(OrchestratorError::SlotNotFound(slot_id))?;
        if !slot.state().is_cancellable() {
            return Err(OrchestratorError::NotCancellable {
                slot_id,
                state: slot.state(),
            });
        }
        let was = slot.state();
        slot.cancel()?;
        let cancelled = slot.clone();

        self.pending.retain(|id| *id != slot_id);
        if let Some(transfer) = self.active.remove(&slot_id) {
            transfer.cancel.cancel();
            ACTIVE_TRANSFERS.dec();
        }
        UPLOADS_CANCELLED.inc();
        info!(slot_id = %slot_id, from = %was, "Upload cancelled");
        Ok(cancelled)
    }

    fn admit_pending(&mut self) {
        while let Some(&slot_id) = self.pending.front() {
            let permit = match self.gate.try_acquire() {
                Ok(Some(permit)) => permit,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Concurrency gate unavailable");
                    break;
                }
            };
            self.pending.pop_front();
            self.start_transfer(slot_id, permit);
        }
    }

    fn start_transfer(&mut self, slot_id: SlotId, permit: GatePermit) {
        let Some(slot) = self.slot_mut(slot_id) else {
            return;
        };
        if let Err(e) = slot.start_upload() {
            warn!(slot_id = %slot_id, error = %e, "Cannot start transfer");
            return;
        }
        let file = slot.file().clone();
        info!(slot_id = %slot_id, file = %file.name(), "Upload started");

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();
        let progress_events = self.events_tx.clone();
        let progress = ProgressReporter::new(move |bytes_sent| {
            let _ = progress_events.send(Event::Progress {
                slot_id,
                bytes_sent,
            });
        });

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(TransportError::Cancelled),
                result = transport.upload(&file, progress, token.clone()) => result,
            };
            let _ = events.send(Event::TransferFinished { slot_id, result });
        });

        ACTIVE_TRANSFERS.inc();
        self.active.insert(
            slot_id,
            ActiveTransfer {
                cancel,
                _permit: permit,
                started_at: Instant::now(),
            },
        );
    }

    fn on_transfer_finished(
        &mut self,
        slot_id: SlotId,
        result: Result<UploadAccepted, TransportError>,
    ) {
        let Some(transfer) = self.active.remove(&slot_id) else {
            debug!(slot_id = %slot_id, "Ignoring result of a transfer that is no longer active");
            return;
        };
        ACTIVE_TRANSFERS.dec();
        let elapsed = transfer.started_at.elapsed().as_secs_f64();
        drop(transfer);

        let Some(slot) = self.slot_mut(slot_id) else {
            return;
        };

        match result {
            Ok(accepted) => {
                let size = slot.total_bytes();
                if let Err(e) = slot.finish_upload(accepted.video_id.clone()) {
                    warn!(slot_id = %slot_id, error = %e, "Discarding transfer result");
                    return;
                }
                TRANSFER_DURATION.with_label_values(&["success"]).observe(elapsed);
                BYTES_UPLOADED.inc_by(size);
                info!(slot_id = %slot_id, video_id = %accepted.video_id, "Upload accepted, processing");
                self.poller.track(slot_id, accepted.video_id);
            }
            Err(e) => {
                let kind = e.classify().unwrap_or(UploadErrorKind::NetworkError);
                if let Err(err) = slot.mark_failed(ErrorDetail::new(kind, e.to_string())) {
                    warn!(slot_id = %slot_id, error = %err, "Discarding transfer failure");
                    return;
                }
                TRANSFER_DURATION.with_label_values(&["failed"]).observe(elapsed);
                TRANSFER_FAILURES.with_label_values(&[kind.as_str()]).inc();
                UPLOADS_COMPLETED.with_label_values(&["failed"]).inc();
                warn!(slot_id = %slot_id, kind = kind.as_str(), error = %e, "Upload failed");
            }
        }
    }

    fn on_status_update(&mut self, update: StatusUpdate) {
        let StatusUpdate {
            slot_id,
            video_id,
            status,
        } = update;
        let Some(slot) = self.slot_mut(slot_id) else {
            return;
        };

        let applied = match status.state {
            RemoteState::Ready => slot.mark_ready(status.encodings).map(|_| "ready"),
            RemoteState::Failed => {
                let reason = status
                    .reason
                    .unwrap_or_else(|| "processing failed".to_string());
                slot.mark_failed(ErrorDetail::new(UploadErrorKind::ProcessingFailed, reason))
                    .map(|_| "failed")
            }
            RemoteState::Processing => return,
        };

        match applied {
            Ok(result) => {
                UPLOADS_COMPLETED.with_label_values(&[result]).inc();
                info!(slot_id = %slot_id, video_id = %video_id, result, "Processing finished");
            }
            Err(e) => warn!(slot_id = %slot_id, error = %e, "Ignoring stale status"),
        }
    }

    fn start_poll(&mut self) {
        let Some(batch) = self.poller.begin_cycle() else {
            return;
        };
        let client = Arc::clone(&self.status_client);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.query(&batch).await;
            let _ = events.send(Event::StatusReport(result));
        });
    }

    fn shutdown(&mut self) {
        info!(
            active = self.active.len(),
            queued = self.pending.len(),
            "Stopping upload orchestrator"
        );
        self.running.store(false, Ordering::SeqCst);

        for (slot_id, transfer) in std::mem::take(&mut self.active) {
            transfer.cancel.cancel();
            ACTIVE_TRANSFERS.dec();
            self.cancel_for_shutdown(slot_id);
        }
        for slot_id in std::mem::take(&mut self.pending) {
            self.cancel_for_shutdown(slot_id);
        }
        self.poller.stop();
        self.gate.close();
        self.publish();
    }

    fn cancel_for_shutdown(&mut self, slot_id: SlotId) {
        if let Some(slot) = self.slot_mut(slot_id) {
            if slot.cancel().is_ok() {
                UPLOADS_CANCELLED.inc();
            }
        }
    }

    fn publish(&self) {
        let snapshot = UploadsSnapshot::build(&self.slots, self.config.concurrent_upload_limit);
        self.snapshot_tx.send_replace(snapshot);
    }

    fn insert(&mut self, slot: UploadSlot) {
        self.index.insert(slot.id(), self.slots.len());
        self.slots.push(slot);
    }

    fn slot_mut(&mut self, slot_id: SlotId) -> Option<&mut UploadSlot> {
        let idx = *self.index.get(&slot_id)?;
        self.slots.get_mut(idx)
    }
}
