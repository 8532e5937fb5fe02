use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidup_core::{
    load_config, load_previous_uploads, validate_config, HttpStatusClient, HttpUploadTransport,
    StatusClient, UploadOrchestrator, UploadTransport,
};
use vidup_server::api::create_router;
use vidup_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("VIDUP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Submit endpoint: {}", config.endpoints.submit_url);
    info!("Status endpoint: {}", config.endpoints.status_url);
    info!(
        "Concurrent upload limit: {}",
        config.uploads.concurrent_upload_limit
    );

    // Previously submitted uploads
    let previous_uploads = match &config.seed_path {
        Some(path) => {
            let records = load_previous_uploads(path)
                .await
                .with_context(|| format!("Failed to load previous uploads from {:?}", path))?;
            info!("Loaded {} previous uploads", records.len());
            records
        }
        None => Vec::new(),
    };

    let transport: Arc<dyn UploadTransport> = Arc::new(
        HttpUploadTransport::new(config.endpoints.submit_url.clone(), &config.transport)
            .context("Failed to create upload transport")?,
    );
    let status_client: Arc<dyn StatusClient> = Arc::new(
        HttpStatusClient::new(config.endpoints.status_url.clone(), &config.transport)
            .context("Failed to create status client")?,
    );

    let orchestrator = UploadOrchestrator::new(config.uploads.clone(), transport, status_client)
        .with_previous_uploads(previous_uploads)
        .start()
        .context("Failed to start upload orchestrator")?;
    info!("Upload orchestrator started");

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), orchestrator.clone()));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Stopping orchestrator...");
    orchestrator.shutdown().await;
    info!("Orchestrator stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
