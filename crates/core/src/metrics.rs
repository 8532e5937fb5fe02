//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (enqueue, rejections, terminal outcomes)
//! - Transfers (bytes, failures, duration, active count)
//! - Status polling (cycles, batch size)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Files accepted into the queue.
pub static UPLOADS_ENQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("vidup_uploads_enqueued_total", "Total files accepted for upload").unwrap()
});

/// Files rejected by validation, by reason.
pub static UPLOADS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidup_uploads_rejected_total",
            "Total files rejected before upload",
        ),
        &["reason"], // "file_too_large", "unsupported_format"
    )
    .unwrap()
});

/// Slots reaching Ready or Failed.
pub static UPLOADS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidup_uploads_completed_total",
            "Total uploads reaching a terminal server state",
        ),
        &["result"], // "ready", "failed"
    )
    .unwrap()
});

/// Slots cancelled by the user.
pub static UPLOADS_CANCELLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("vidup_uploads_cancelled_total", "Total uploads cancelled").unwrap()
});

// =============================================================================
// Transfer Metrics
// =============================================================================

/// Transfers currently holding a concurrency permit.
pub static ACTIVE_TRANSFERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vidup_active_transfers",
        "Number of transfers currently in flight",
    )
    .unwrap()
});

/// Transfer failures by classified kind.
pub static TRANSFER_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidup_transfer_failures_total", "Total failed transfers"),
        &["kind"], // "network_error", "server_rejected", "timeout"
    )
    .unwrap()
});

/// Bytes of files accepted by the submission endpoint.
pub static BYTES_UPLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vidup_bytes_uploaded_total",
        "Total bytes of successfully submitted files",
    )
    .unwrap()
});

/// Transfer duration in seconds.
pub static TRANSFER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("vidup_transfer_duration_seconds", "Duration of transfers").buckets(
            vec![1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0],
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Status Polling Metrics
// =============================================================================

/// Status poll cycles by result.
pub static STATUS_POLLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidup_status_polls_total", "Total batched status queries"),
        &["result"], // "success", "error"
    )
    .unwrap()
});

/// Video IDs covered per batched status query.
pub static STATUS_BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "vidup_status_batch_size",
            "Number of videos covered by one status query",
        )
        .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 100.0, 500.0, 1000.0]),
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(UPLOADS_ENQUEUED.clone()),
        Box::new(UPLOADS_REJECTED.clone()),
        Box::new(UPLOADS_COMPLETED.clone()),
        Box::new(UPLOADS_CANCELLED.clone()),
        // Transfers
        Box::new(ACTIVE_TRANSFERS.clone()),
        Box::new(TRANSFER_FAILURES.clone()),
        Box::new(BYTES_UPLOADED.clone()),
        Box::new(TRANSFER_DURATION.clone()),
        // Status polling
        Box::new(STATUS_POLLS.clone()),
        Box::new(STATUS_BATCH_SIZE.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_cleanly() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        UPLOADS_REJECTED.with_label_values(&["file_too_large"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "vidup_uploads_rejected_total"));
    }
}
