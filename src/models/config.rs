use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path of the configuration store file
    pub store_path: PathBuf,

    /// Directory holding per-filter IP list files
    pub data_dir: PathBuf,

    /// Base URL of the enforcement backend RPC
    pub backend_url: String,

    /// Port for the REST API server
    pub port: u16,

    /// Seconds between connection/allowed-IP polls
    pub feed_interval_secs: u64,

    /// Seconds between service status polls
    pub status_interval_secs: u64,
}
