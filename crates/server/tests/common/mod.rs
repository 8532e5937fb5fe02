//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the router around a
//! running orchestrator whose transport and status client are mocks, so
//! the API can be exercised without any remote service.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vidup_core::{
    load_config_from_str,
    testing::{MockStatusClient, MockUploadTransport},
    OrchestratorHandle, StatusClient, UploadOrchestrator, UploadTransport,
};
use vidup_server::state::AppState;

/// Re-export fixtures for test convenience
pub use vidup_core::testing::fixtures;

const TIMEOUT: Duration = Duration::from_secs(5);

const TEST_CONFIG: &str = r#"
[endpoints]
submit_url = "http://127.0.0.1:9/videos/course"
status_url = "http://127.0.0.1:9/encodings/course"
"#;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_enqueue() {
///     let fixture = TestFixture::new();
///     let path = fixture.write_file("a.mp4", 1024);
///
///     let response = fixture.post("/api/v1/uploads", json!({ "paths": [path] })).await;
///     assert_eq!(response.status, StatusCode::OK);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock transport - script or hold transfers
    pub transport: Arc<MockUploadTransport>,
    /// Mock status client - configure remote processing results
    pub status: Arc<MockStatusClient>,
    pub orchestrator: OrchestratorHandle,
    /// Holds the real files handed to `POST /uploads`
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture whose transport accepts every upload immediately.
    pub fn new() -> Self {
        Self::with_transport(MockUploadTransport::new())
    }

    /// Fixture whose transport holds every upload open until released.
    pub fn holding() -> Self {
        Self::with_transport(MockUploadTransport::holding())
    }

    pub fn with_transport(transport: MockUploadTransport) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let transport = Arc::new(transport);
        let status = Arc::new(MockStatusClient::new());

        let mut config = load_config_from_str(TEST_CONFIG).expect("Failed to parse test config");
        config.uploads = fixtures::orchestrator_config(2);

        let orchestrator = UploadOrchestrator::new(
            config.uploads.clone(),
            Arc::clone(&transport) as Arc<dyn UploadTransport>,
            Arc::clone(&status) as Arc<dyn StatusClient>,
        )
        .start()
        .expect("Failed to start orchestrator");

        let state = Arc::new(AppState::new(config, orchestrator.clone()));
        let router = vidup_server::api::create_router(state);

        Self {
            router,
            transport,
            status,
            orchestrator,
            temp_dir,
        }
    }

    /// Write a file of `size` zero bytes into the fixture's temp dir.
    pub fn write_file(&self, name: &str, size: usize) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, vec![0u8; size]).expect("Failed to write test file");
        path
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Poll `GET /api/v1/uploads` until `check` accepts the snapshot.
    pub async fn wait_for_uploads(&self, check: impl Fn(&Value) -> bool) -> Option<Value> {
        let start = std::time::Instant::now();
        while start.elapsed() < TIMEOUT {
            let response = self.get("/api/v1/uploads").await;
            if check(&response.body) {
                return Some(response.body);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        let (status, body_bytes) = self.send(request).await;

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, body_bytes.to_vec())
    }
}
