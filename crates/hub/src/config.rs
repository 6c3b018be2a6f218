//! Configuration management for the Beamdrop hub.
//!
//! This module provides TOML-based configuration file loading. The default
//! configuration path is `~/.config/beamdrop/config.toml`; every section
//! has sensible defaults so the hub runs with no file at all.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use protocol::framing::{DOWNLOAD_CHUNK_SIZE, MAX_FRAME_SIZE};

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("bind address is not a valid IP address: {0}")]
    InvalidBindAddr(String),

    #[error("download_chunk_size must be between 1 and {max}, got {got}")]
    InvalidChunkSize { got: usize, max: usize },

    #[error("max_frame_size must be greater than 0")]
    InvalidMaxFrameSize,

    #[error("file_ttl_secs must be greater than 0")]
    InvalidFileTtl,

    #[error("sweep_interval_secs must be greater than 0")]
    InvalidSweepInterval,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the Beamdrop hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General hub configuration.
    pub hub: HubConfig,

    /// Listener configuration.
    pub server: ServerConfig,

    /// File transfer configuration.
    pub transfer: TransferConfig,

    /// Janitor configuration.
    pub cleanup: CleanupConfig,
}

/// General hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    /// Directory for persisted state (usage stats, feedback log).
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind; all IPv4 interfaces by default.
    pub bind: String,

    /// TCP port for both the HTTP API and the WebSocket upgrade.
    pub port: u16,
}

/// File transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Per-frame cap enforced at the WebSocket layer, in bytes.
    pub max_frame_size: usize,

    /// Chunk size for hub-to-client download streaming, in bytes.
    pub download_chunk_size: usize,
}

/// Janitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleanupConfig {
    /// Maximum age of a buffered file before it is reclaimed, in seconds.
    pub file_ttl_secs: u64,

    /// Interval between janitor sweeps, in seconds.
    pub sweep_interval_secs: u64,

    /// Delay before the one-shot check that removes a freshly emptied
    /// session, in seconds.
    pub empty_session_grace_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            download_chunk_size: DOWNLOAD_CHUNK_SIZE,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            file_ttl_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
            empty_session_grace_secs: 5 * 60,
        }
    }
}

impl CleanupConfig {
    /// Maximum file (and empty-session) age as a [`Duration`].
    pub fn file_ttl(&self) -> Duration {
        Duration::from_secs(self.file_ttl_secs)
    }

    /// Sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// One-shot empty-session grace period as a [`Duration`].
    pub fn empty_session_grace(&self) -> Duration {
        Duration::from_secs(self.empty_session_grace_secs)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beamdrop")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beamdrop")
}

impl Config {
    /// Load configuration from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, falling back to defaults
    /// when no file exists.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - `PORT`: listener port
    /// - `BEAMDROP_LOG_LEVEL`: log level (trace, debug, info, warn, error)
    /// - `BEAMDROP_DATA_DIR`: data directory for persisted state
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    tracing::info!(port, "Overriding port from environment");
                    self.server.port = port;
                }
                Err(_) => {
                    tracing::warn!(value = %port, "Ignoring unparseable PORT variable");
                }
            }
        }

        if let Ok(level) = std::env::var("BEAMDROP_LOG_LEVEL") {
            if !level.is_empty() {
                self.hub.log_level = level;
            }
        }

        if let Ok(dir) = std::env::var("BEAMDROP_DATA_DIR") {
            if !dir.is_empty() {
                self.hub.data_dir = PathBuf::from(dir);
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::InvalidBindAddr(self.server.bind.clone()));
        }

        if self.transfer.max_frame_size == 0 {
            return Err(ConfigError::InvalidMaxFrameSize);
        }

        if self.transfer.download_chunk_size == 0
            || self.transfer.download_chunk_size > self.transfer.max_frame_size
        {
            return Err(ConfigError::InvalidChunkSize {
                got: self.transfer.download_chunk_size,
                max: self.transfer.max_frame_size,
            });
        }

        if self.cleanup.file_ttl_secs == 0 {
            return Err(ConfigError::InvalidFileTtl);
        }

        if self.cleanup.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval);
        }

        if !VALID_LOG_LEVELS.contains(&self.hub.log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.hub.log_level.clone()));
        }

        Ok(())
    }
}
