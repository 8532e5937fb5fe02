//! Batched status polling schedule.
//!
//! The poller owns the set of video ids awaiting a terminal server state and
//! a repeating timer that exists only while that set is non-empty. It never
//! performs I/O itself: the control loop awaits `tick`, takes the batch from
//! `begin_cycle`, runs the query, and hands the result to `complete_cycle`.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::metrics::{STATUS_BATCH_SIZE, STATUS_POLLS};
use crate::slot::SlotId;

use super::{RemoteStatus, StatusError};

/// A terminal status observed for a tracked slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub slot_id: SlotId,
    pub video_id: String,
    pub status: RemoteStatus,
}

#[derive(Debug)]
pub struct StatusPoller {
    interval: Duration,
    /// video_id -> slots awaiting it, ordered for a stable batch.
    ///
    /// Several slots can share one id (a re-upload the server deduplicated),
    /// and each of them receives the terminal status.
    tracked: BTreeMap<String, Vec<SlotId>>,
    ticker: Option<Interval>,
    in_flight: bool,
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            tracked: BTreeMap::new(),
            ticker: None,
            in_flight: false,
        }
    }

    /// Start polling for `video_id`. The timer starts with the first id.
    pub fn track(&mut self, slot_id: SlotId, video_id: impl Into<String>) {
        let slots = self.tracked.entry(video_id.into()).or_default();
        if !slots.contains(&slot_id) {
            slots.push(slot_id);
        }
        if self.ticker.is_none() {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);
            debug!(interval_ms = self.interval.as_millis() as u64, "Status polling started");
        }
    }

    pub fn is_tracking(&self, video_id: &str) -> bool {
        self.tracked.contains_key(video_id)
    }

    /// Number of tracked slots.
    pub fn len(&self) -> usize {
        self.tracked.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Whether the repeating timer currently exists.
    pub fn is_scheduled(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Resolve at the next poll instant.
    ///
    /// Never resolves while nothing is tracked or a query is outstanding, so
    /// it can sit in a `select!` unconditionally. Cancel safe.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) if !self.in_flight => {
                ticker.tick().await;
            }
            _ => std::future::pending::<()>().await,
        }
    }

    /// Take the ids for one batched query and mark it outstanding.
    ///
    /// Returns `None` when there is nothing to poll or a query is already
    /// in flight.
    pub fn begin_cycle(&mut self) -> Option<Vec<String>> {
        if self.in_flight || self.tracked.is_empty() {
            return None;
        }
        self.in_flight = true;
        let batch: Vec<String> = self.tracked.keys().cloned().collect();
        STATUS_BATCH_SIZE.observe(batch.len() as f64);
        debug!(count = batch.len(), "Status poll cycle");
        Some(batch)
    }

    /// Apply the outcome of the outstanding query.
    ///
    /// Terminal statuses are returned and their ids dropped from the set. A
    /// failed query keeps every id for the next interval.
    pub fn complete_cycle(
        &mut self,
        result: Result<HashMap<String, RemoteStatus>, StatusError>,
    ) -> Vec<StatusUpdate> {
        self.in_flight = false;

        let updates = match result {
            Ok(mut statuses) => {
                STATUS_POLLS.with_label_values(&["success"]).inc();
                let finished: Vec<String> = self
                    .tracked
                    .keys()
                    .filter(|id| statuses.get(*id).is_some_and(|s| s.state.is_terminal()))
                    .cloned()
                    .collect();

                let mut updates = Vec::new();
                for video_id in finished {
                    let (Some(slots), Some(status)) =
                        (self.tracked.remove(&video_id), statuses.remove(&video_id))
                    else {
                        continue;
                    };
                    updates.extend(slots.into_iter().map(|slot_id| StatusUpdate {
                        slot_id,
                        video_id: video_id.clone(),
                        status: status.clone(),
                    }));
                }
                updates
            }
            Err(e) => {
                STATUS_POLLS.with_label_values(&["error"]).inc();
                warn!(error = %e, tracked = self.len(), "Status poll failed, retrying next interval");
                Vec::new()
            }
        };

        if self.tracked.is_empty() {
            if self.ticker.take().is_some() {
                debug!("Status polling stopped");
            }
        } else if let Some(ticker) = self.ticker.as_mut() {
            // Next query is a full interval after this one finished.
            ticker.reset();
        }

        updates
    }

    /// Forget every tracked id and stop the timer.
    pub fn stop(&mut self) {
        self.tracked.clear();
        self.ticker = None;
        self.in_flight = false;
    }
}
