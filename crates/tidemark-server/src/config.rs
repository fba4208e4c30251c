//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration, loadable from `tidemark.toml` plus
/// `TIDEMARK_*` environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Directories holding chart sets
    pub chart_dirs: Vec<PathBuf>,
    /// Chart cache budget in kilobytes
    pub chart_cache_kb: usize,
    /// Tile cache budget in bytes
    pub tile_cache_bytes: usize,
    /// Opener helper executable; empty disables the opener pool
    pub opener_command: String,
    /// Number of opener workers
    pub opener_workers: usize,
    /// Font file for text rendering; empty disables text
    pub font_file: String,
    /// Persisted chart-info cache file
    pub chart_info_cache: String,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Housekeeper cadence in seconds
    pub housekeeper_interval_secs: u64,
    /// Idle charts older than this are trimmed (seconds)
    pub chart_idle_secs: u64,
    /// Start the background cache filler
    pub enable_filler: bool,
    /// Draw tile debug frames
    pub render_debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8082,
            chart_dirs: Vec::new(),
            chart_cache_kb: 512 * 1024,
            tile_cache_bytes: 128 * 1024 * 1024,
            opener_command: String::new(),
            opener_workers: 2,
            font_file: String::new(),
            chart_info_cache: String::new(),
            request_timeout_secs: 30,
            housekeeper_interval_secs: 60,
            chart_idle_secs: 600,
            enable_filler: false,
            render_debug: false,
        }
    }
}

impl ServerConfig {
    /// Load from `tidemark.toml` (optional) and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("tidemark").required(false))
            .add_source(config::Environment::with_prefix("TIDEMARK").separator("__"))
            .build()?;
        let mut cfg: ServerConfig = settings.try_deserialize().unwrap_or_default();
        if cfg.opener_workers == 0 {
            cfg.opener_workers = 1;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = ServerConfig::default();
        assert!(cfg.port > 0);
        assert!(cfg.chart_cache_kb > 0);
        assert!(!cfg.render_debug);
    }
}
