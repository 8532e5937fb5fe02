//! Metrics middleware for API routes.

use axum::{
    body::Body,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};

/// Path served to the Prometheus scraper.
const SCRAPE_PATH: &str = "/metrics";

/// How a request is accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    /// Prometheus scrape; not recorded.
    Scrape,
    /// Snapshot stream upgrade; counted, but the handshake time says nothing
    /// about how long the stream lives.
    Upgrade,
    /// Regular API call.
    Api,
}

impl RequestKind {
    fn of(request: &Request<Body>) -> Self {
        if request.uri().path() == SCRAPE_PATH {
            return Self::Scrape;
        }
        let upgrade = request
            .headers()
            .get(header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
        if upgrade {
            Self::Upgrade
        } else {
            Self::Api
        }
    }
}

/// Records request counts, latency and in-flight requests for the uploads API.
///
/// Slot ids in paths are folded into `{id}` so cancelling many uploads does
/// not create one label set per slot.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let kind = RequestKind::of(&request);
    if kind == RequestKind::Scrape {
        return next.run(request).await;
    }

    let started = Instant::now();
    let method = request.method().as_str().to_owned();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();
    let response = next.run(request).await;
    HTTP_REQUESTS_IN_FLIGHT.dec();

    let status = response.status().as_u16().to_string();
    let labels = [method.as_str(), path.as_str(), status.as_str()];

    HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();
    if kind == RequestKind::Api {
        HTTP_REQUEST_DURATION
            .with_label_values(&labels)
            .observe(started.elapsed().as_secs_f64());
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        middleware,
        routing::{delete, get},
        Router,
    };
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "OK"
    }

    fn app() -> Router {
        Router::new()
            .route("/metrics", get(ok_handler))
            .route("/api/v1/uploads/{id}", delete(ok_handler))
            .route("/api/v1/uploads/ws", get(ok_handler))
            .layer(middleware::from_fn(metrics_middleware))
    }

    async fn send(request: Request<Body>) -> StatusCode {
        app().oneshot(request).await.unwrap().status()
    }

    #[test]
    fn test_request_kind() {
        let scrape = Request::get("/metrics").body(Body::empty()).unwrap();
        assert_eq!(RequestKind::of(&scrape), RequestKind::Scrape);

        let upgrade = Request::get("/api/v1/uploads/ws")
            .header(header::UPGRADE, "WebSocket")
            .body(Body::empty())
            .unwrap();
        assert_eq!(RequestKind::of(&upgrade), RequestKind::Upgrade);

        let plain = Request::get("/api/v1/uploads/ws").body(Body::empty()).unwrap();
        assert_eq!(RequestKind::of(&plain), RequestKind::Api);
    }

    #[tokio::test]
    async fn test_cancel_is_counted_by_normalized_path() {
        let labels = ["DELETE", "/api/v1/uploads/{id}", "200"];
        let before = HTTP_REQUESTS_TOTAL.with_label_values(&labels).get();

        let request = Request::delete("/api/v1/uploads/550e8400-e29b-41d4-a716-446655440000")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(request).await, StatusCode::OK);

        assert!(HTTP_REQUESTS_TOTAL.with_label_values(&labels).get() > before);
        assert!(
            HTTP_REQUEST_DURATION
                .with_label_values(&labels)
                .get_sample_count()
                >= 1
        );
    }

    #[tokio::test]
    async fn test_scrape_is_not_recorded() {
        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        assert_eq!(send(request).await, StatusCode::OK);

        let labels = ["GET", "/metrics", "200"];
        assert_eq!(HTTP_REQUESTS_TOTAL.with_label_values(&labels).get(), 0);
        assert_eq!(
            HTTP_REQUEST_DURATION
                .with_label_values(&labels)
                .get_sample_count(),
            0
        );
    }

    #[tokio::test]
    async fn test_upgrade_is_counted_without_latency() {
        let request = Request::get("/api/v1/uploads/ws")
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "websocket")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(request).await, StatusCode::OK);

        let labels = ["GET", "/api/v1/uploads/ws", "200"];
        assert!(HTTP_REQUESTS_TOTAL.with_label_values(&labels).get() >= 1);
        assert_eq!(
            HTTP_REQUEST_DURATION
                .with_label_values(&labels)
                .get_sample_count(),
            0
        );
    }
}
