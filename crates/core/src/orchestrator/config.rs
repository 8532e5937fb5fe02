//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the upload orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum simultaneous transfers. Must be at least 1.
    #[serde(default = "default_limit")]
    pub concurrent_upload_limit: usize,

    /// Files larger than this are rejected before any network activity.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Accepted file extensions, compared case-insensitively.
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,

    /// How often to query transcoding status (milliseconds).
    /// Only runs while at least one slot is processing.
    #[serde(default = "default_poll_interval")]
    pub status_poll_interval_ms: u64,

    /// Capacity of the command channel feeding the control loop.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_limit() -> usize {
    4
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024 * 1024 // 5 GiB
}

fn default_extensions() -> Vec<String> {
    vec!["mp4".to_string(), "mov".to_string()]
}

fn default_poll_interval() -> u64 {
    5000 // 5 seconds
}

fn default_command_buffer() -> usize {
    64
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrent_upload_limit: default_limit(),
            max_file_size_bytes: default_max_file_size(),
            allowed_extensions: default_extensions(),
            status_poll_interval_ms: default_poll_interval(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}
