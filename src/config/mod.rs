// Configuration module entry point
// Loads application configuration and holds runtime state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::center::{options, CenterOptions};
use crate::http::mime::{split_list, ContentTypeRegistry};

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig, StaticFilesConfig,
};

/// Environment variable prefix, e.g. `STATIC_CACHE__SERVER__PORT=9000`
const ENV_PREFIX: &str = "STATIC_CACHE";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional; environment variables override it and built-in
    /// defaults fill the rest.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "static-cache/0.3")?
            .set_default("http.enable_cors", false)?
            .set_default("http.health_path", "/healthz")?
            .set_default("static_files.root", "static")?
            .set_default("static_files.resource_types", options::DEFAULT_RESOURCE_TYPES)?
            .set_default("static_files.default_pages", options::DEFAULT_PAGES)?
            .set_default("static_files.streamed_types", options::DEFAULT_STREAMED_TYPES)?
            .set_default("static_files.watch_types", options::DEFAULT_WATCH_TYPES)?
            .set_default("static_files.watch", true)?
            .set_default(
                "static_files.reload_interval_ms",
                duration_millis(options::DEFAULT_RELOAD_INTERVAL),
            )?
            .set_default("static_files.chunk_size", options::DEFAULT_CHUNK_SIZE as u64)?
            .set_default(
                "static_files.buffer_pool_capacity",
                options::DEFAULT_BUFFER_POOL_CAPACITY as u64,
            )?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

impl StaticFilesConfig {
    /// Options for the resource index built from these settings
    pub fn to_options(&self) -> CenterOptions {
        CenterOptions {
            root: PathBuf::from(&self.root),
            registry: ContentTypeRegistry::from_list(&self.resource_types),
            default_pages: split_list(&self.default_pages),
            streamed_extensions: options::extension_set(&self.streamed_types),
            watched_extensions: options::extension_set(&self.watch_types),
            reload_interval: Duration::from_millis(self.reload_interval_ms),
            chunk_size: self.chunk_size.max(1),
            buffer_pool_capacity: self.buffer_pool_capacity.max(1),
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
