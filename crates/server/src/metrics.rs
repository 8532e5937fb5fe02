//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the vidup agent:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Slot counts by state (collected from the latest snapshot)
//!
//! Upload and polling metrics live in `vidup_core::metrics` and are
//! registered into the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use vidup_core::{UploadState, UploadsSnapshot};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vidup_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vidup_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vidup_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vidup_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vidup_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// Snapshots pushed to WebSocket clients.
pub static WS_SNAPSHOTS_SENT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vidup_ws_snapshots_sent_total",
        "Upload snapshots sent over WebSocket",
    )
    .unwrap()
});

// =============================================================================
// Slot Metrics (collected dynamically)
// =============================================================================

/// Slots by current state.
pub static SLOTS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("vidup_slots_by_state", "Current slot count by state"),
        &["state"],
    )
    .unwrap()
});

/// Orchestrator running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vidup_orchestrator_running",
        "Whether the orchestrator is running (1) or stopped (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_SNAPSHOTS_SENT.clone()))
        .unwrap();

    // Slots
    registry
        .register(Box::new(SLOTS_BY_STATE.clone()))
        .unwrap();
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();

    // Core metrics (uploads, transfers, status polling)
    vidup_core::register_core_metrics(registry).unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges derived from orchestrator state.
pub fn collect_dynamic_metrics(snapshot: &UploadsSnapshot, running: bool) {
    ORCHESTRATOR_RUNNING.set(if running { 1 } else { 0 });

    for state in [
        UploadState::Queued,
        UploadState::Uploading,
        UploadState::Processing,
        UploadState::Ready,
        UploadState::Failed,
        UploadState::Cancelled,
    ] {
        SLOTS_BY_STATE
            .with_label_values(&[state.as_str()])
            .set(snapshot.count(state) as i64);
    }
}

/// Normalize a path for metric labels (replace slot ids with a placeholder).
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_uuid(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_uuid(segment: &str) -> bool {
    let groups: Vec<&str> = segment.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/uploads/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/uploads/{id}");
    }

    #[test]
    fn test_normalize_path_static() {
        assert_eq!(normalize_path("/api/v1/uploads"), "/api/v1/uploads");
        assert_eq!(normalize_path("/api/v1/uploads/ws"), "/api/v1/uploads/ws");
    }

    #[test]
    fn test_normalize_path_not_quite_uuid() {
        let path = "/api/v1/uploads/550e8400-e29b-41d4-a716-44665544000z";
        assert_eq!(normalize_path(path), path);
    }

    #[test]
    fn test_encode_includes_core_metrics() {
        vidup_core::metrics::UPLOADS_ENQUEUED.inc();
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        let text = encode_metrics();
        assert!(text.contains("vidup_http_requests_in_flight"));
        assert!(text.contains("vidup_uploads_enqueued_total"));
    }

    #[test]
    fn test_collect_dynamic_metrics() {
        collect_dynamic_metrics(&UploadsSnapshot::default(), true);
        assert_eq!(ORCHESTRATOR_RUNNING.get(), 1);
        assert_eq!(SLOTS_BY_STATE.with_label_values(&["queued"]).get(), 0);
    }
}
