//! ChainPulse Configuration Module
//!
//! This module provides the configuration types for the chainpulse daemon:
//! the RPC source to poll, the two aggregation windows, retry behavior,
//! cache retention, the HTTP surface, and logging.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default JSON-RPC endpoint to poll.
pub const DEFAULT_RPC_URL: &str = "http://dappnode1.ont.io:20336";
/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Fixed-window defaults
pub const DEFAULT_WINDOW_BLOCKS: u64 = 1000;
pub const DEFAULT_FIXED_POLL_MS: u64 = 1000;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Time-window defaults
pub const DEFAULT_TIME_WINDOW_SECS: u64 = 60;
pub const DEFAULT_TIME_POLL_MS: u64 = 2500;

/// Retry defaults
pub const DEFAULT_UNINDEXED_RETRY_MS: u64 = 500;
pub const DEFAULT_NETWORK_RETRY_MS: u64 = 250;
pub const DEFAULT_MAX_NETWORK_ATTEMPTS: u32 = 3;

/// Cache retention slack kept below the active window.
pub const DEFAULT_RETENTION_BUFFER: u64 = 5;

/// Default capacity of the snapshot broadcast channel.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Default HTTP surface port (health, stats, metrics).
pub const DEFAULT_HTTP_PORT: u16 = 9090;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Remote node to poll
    pub source: SourceConfig,
    /// Last-K-blocks aggregation
    pub fixed_window: FixedWindowConfig,
    /// Wall-clock-span aggregation
    pub time_window: TimeWindowConfig,
    /// Per-failure-kind retry behavior
    pub retry: RetryConfig,
    /// Block cache retention
    pub cache: CacheConfig,
    /// Snapshot publishing
    pub publish: PublishConfig,
    /// HTTP surface (health, stats, metrics)
    pub http: HttpConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Remote node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Fixed-window aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedWindowConfig {
    /// Run the fixed-window cycle
    pub enabled: bool,
    /// Number of trailing blocks in the window
    pub window_blocks: u64,
    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Upper bound on concurrent block fetches per cycle
    pub max_in_flight: usize,
}

/// Time-window aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeWindowConfig {
    /// Run the time-window cycle
    pub enabled: bool,
    /// Wall-clock span the window must cover, in seconds
    pub window_secs: u64,
    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay between retries for not-yet-indexed heights, in milliseconds
    pub unindexed_retry_ms: u64,
    /// Delay between retries for network failures, in milliseconds
    pub network_retry_ms: u64,
    /// Total attempts allowed per height for network failures
    pub max_network_attempts: u32,
}

/// Cache retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Extra heights kept below the active window before eviction
    pub retention_buffer: u64,
}

/// Snapshot publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Snapshots buffered per lagging broadcast subscriber
    pub broadcast_capacity: usize,
}

/// HTTP surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Serve the HTTP surface
    pub enabled: bool,
    /// Loopback port to bind
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
    /// Log to file
    pub log_to_file: bool,
    /// Log file path
    pub log_file: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            fixed_window: FixedWindowConfig::default(),
            time_window: TimeWindowConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            publish: PublishConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for FixedWindowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_blocks: DEFAULT_WINDOW_BLOCKS,
            poll_interval_ms: DEFAULT_FIXED_POLL_MS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl Default for TimeWindowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: DEFAULT_TIME_WINDOW_SECS,
            poll_interval_ms: DEFAULT_TIME_POLL_MS,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            unindexed_retry_ms: DEFAULT_UNINDEXED_RETRY_MS,
            network_retry_ms: DEFAULT_NETWORK_RETRY_MS,
            max_network_attempts: DEFAULT_MAX_NETWORK_ATTEMPTS,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention_buffer: DEFAULT_RETENTION_BUFFER,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DEFAULT_HTTP_PORT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_to_file: false,
            log_file: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from file, or create the file with defaults if it
    /// does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MonitorConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.source.rpc_url)
            .map_err(|e| ConfigError::Invalid(format!("source.rpc_url: {}", e)))?;

        if self.source.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "source.request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.fixed_window.window_blocks == 0 {
            return Err(ConfigError::Invalid(
                "fixed_window.window_blocks must be greater than 0".into(),
            ));
        }
        if self.fixed_window.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "fixed_window.poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.fixed_window.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "fixed_window.max_in_flight must be greater than 0".into(),
            ));
        }
        if self.time_window.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "time_window.window_secs must be greater than 0".into(),
            ));
        }
        if self.time_window.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "time_window.poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.retry.max_network_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_network_attempts must be greater than 0".into(),
            ));
        }
        if self.publish.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid(
                "publish.broadcast_capacity must be greater than 0".into(),
            ));
        }
        if !self.fixed_window.enabled && !self.time_window.enabled {
            return Err(ConfigError::Invalid(
                "at least one of fixed_window and time_window must be enabled".into(),
            ));
        }

        Ok(())
    }

    /// Loopback address the HTTP surface binds.
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.http.port))
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl FixedWindowConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl TimeWindowConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl RetryConfig {
    pub fn unindexed_retry(&self) -> Duration {
        Duration::from_millis(self.unindexed_retry_ms)
    }

    pub fn network_retry(&self) -> Duration {
        Duration::from_millis(self.network_retry_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fixed_window.window_blocks, DEFAULT_WINDOW_BLOCKS);
        assert_eq!(config.cache.retention_buffer, DEFAULT_RETENTION_BUFFER);
        assert_eq!(config.retry.unindexed_retry(), Duration::from_millis(500));
        assert_eq!(config.retry.network_retry(), Duration::from_millis(250));
        assert_eq!(config.retry.max_network_attempts, 3);
        assert_eq!(config.time_window.window(), Duration::from_secs(60));
        assert_eq!(config.publish.broadcast_capacity, DEFAULT_BROADCAST_CAPACITY);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
            [fixed_window]
            window_blocks = 100
            poll_interval_ms = 100
        "#;
        let config: MonitorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.fixed_window.window_blocks, 100);
        assert_eq!(config.fixed_window.poll_interval_ms, 100);
        // Untouched sections keep their defaults.
        assert_eq!(config.source.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.time_window.window_secs, DEFAULT_TIME_WINDOW_SECS);
        assert_eq!(config.fixed_window.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
    }

    #[test]
    fn validate_rejects_bad_url() {
        let mut config = MonitorConfig::default();
        config.source.rpc_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_zero_window() {
        let mut config = MonitorConfig::default();
        config.fixed_window.window_blocks = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("window_blocks"));
    }

    #[test]
    fn validate_rejects_all_windows_disabled() {
        let mut config = MonitorConfig::default();
        config.fixed_window.enabled = false;
        config.time_window.enabled = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn http_addr_is_loopback() {
        let config = MonitorConfig::default();
        let addr = config.http_addr();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), DEFAULT_HTTP_PORT);
    }
}
