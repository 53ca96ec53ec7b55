// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub static_files: StaticFilesConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    /// Health check path; `None` disables it
    #[serde(default)]
    pub health_path: Option<String>,
}

/// Static resource cache configuration
///
/// List-valued settings are semicolon-separated, e.g. `"index.html;index.htm"`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StaticFilesConfig {
    /// Directory served as the URL root
    pub root: String,
    /// Servable extensions
    pub resource_types: String,
    /// Pages tried in order for `/`
    pub default_pages: String,
    /// Extensions read from disk per request instead of pre-compressed
    pub streamed_types: String,
    /// Extensions whose changes trigger a reload
    pub watch_types: String,
    /// Enable the file watcher
    pub watch: bool,
    /// A resource younger than this is reused instead of reloaded
    pub reload_interval_ms: u64,
    /// Bytes per body chunk
    pub chunk_size: usize,
    /// Buffers kept per streamed resource
    pub buffer_pool_capacity: usize,
}
