use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub uploads: OrchestratorConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// JSON file with the previous-uploads snapshot used to seed the orchestrator.
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
}

/// Remote endpoints handed to the orchestrator by the page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointsConfig {
    /// Destination for file transfer requests.
    pub submit_url: String,
    /// Destination for batched status queries (the encodings endpoint).
    pub status_url: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Connection establishment timeout in seconds (default: 30)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds (default: 3600, large files take a while)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Read buffer used when streaming file bodies (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            chunk_size_bytes: default_chunk_size(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    3600
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8790
}
