//! CLI configuration management

use crate::viewer::{ConnectionOptions, MessageStore, ReconnectPolicy};
use anyhow::{Context, Result};
use eventscope_common::{constants, Credentials};
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the configuration directory path
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventscope")
    }

    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".eventscope")
    }
}

/// Get the config file path
pub fn config_file() -> PathBuf {
    config_dir().join("config.yml")
}

/// Get the logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Get the log file used while the TUI owns the terminal
pub fn log_file() -> PathBuf {
    logs_dir().join("eventscope.log")
}

/// Ensure all config directories exist
pub fn ensure_dirs() -> Result<()> {
    let config = config_dir();
    let logs = logs_dir();

    fs::create_dir_all(&config).context("Failed to create config directory")?;
    fs::create_dir_all(&logs).context("Failed to create logs directory")?;

    Ok(())
}

/// Main configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Origin the endpoint is resolved against (default: http://localhost:8080)
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Seconds between heartbeat requests
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Seconds to wait for a heartbeat reply before dropping the connection
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// Maximum number of messages kept; unset keeps everything
    #[serde(default)]
    pub capacity: Option<usize>,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Basic auth user sent with the WebSocket upgrade
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Reconnection section of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_origin() -> String {
    format!("http://localhost:{}", constants::DEFAULT_RELAY_PORT)
}

fn default_heartbeat_interval() -> u64 {
    constants::HEARTBEAT_INTERVAL_SECONDS
}

fn default_heartbeat_timeout() -> u64 {
    constants::HEARTBEAT_TIMEOUT_SECONDS
}

fn default_initial_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    60_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            capacity: None,
            reconnect: ReconnectConfig::default(),
            username: None,
            password: None,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: None,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file())
    }

    /// Load config from a specific path, falling back to defaults if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Connection settings for a viewer session
    pub fn connection_options(&self) -> ConnectionOptions {
        let reconnect = ReconnectPolicy {
            enabled: self.reconnect.enabled,
            initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms.max(1)),
            max_delay: Duration::from_millis(
                self.reconnect.max_delay_ms.max(self.reconnect.initial_delay_ms),
            ),
            max_attempts: self.reconnect.max_attempts,
        };

        ConnectionOptions {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs.max(1)),
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout_secs.max(1)),
            reconnect,
            credentials: self.credentials(),
        }
    }

    /// Credentials are sent only when a username is configured
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.as_ref()?;
        Some(Credentials::new(
            username.clone(),
            self.password.clone().unwrap_or_default(),
        ))
    }

    /// Message store sized by the configured capacity
    pub fn message_store(&self) -> MessageStore {
        MessageStore::new(self.capacity.and_then(NonZeroUsize::new))
    }
}
