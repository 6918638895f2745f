//! Configuration for the transfer client

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sitesync_core::{Error, Result, SiteDescriptor};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Transfer client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bound on TCP connect, SSH handshake and channel open, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// SSH keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u32,

    /// Bound on each blocking request of an established session, in seconds
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Bytes per write request during uploads
    #[serde(default = "default_transfer_chunk_size")]
    pub transfer_chunk_size: usize,

    /// Minimum byte distance between two progress callbacks
    #[serde(default = "default_progress_interval")]
    pub progress_interval_bytes: u64,

    /// Whether uploads replace an existing remote file unless told otherwise
    #[serde(default = "default_true")]
    pub overwrite_uploads: bool,

    /// Whether a rename may replace an existing target
    #[serde(default)]
    pub overwrite_on_rename: bool,

    /// File where trust-on-first-use host key pins are persisted
    #[serde(default)]
    pub known_hosts_file: Option<PathBuf>,

    /// JSON-lines transaction log
    #[serde(default)]
    pub audit_file: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sites served by the file-backed site directory
    #[serde(default)]
    pub sites: Vec<SiteDescriptor>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (text or json)
    pub format: LogFormat,
    /// Optional log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text logging for human readability
    Text,
    /// JSON structured logging for log aggregators
    Json,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            keepalive_interval_secs: default_keepalive_interval(),
            operation_timeout_secs: default_operation_timeout(),
            transfer_chunk_size: default_transfer_chunk_size(),
            progress_interval_bytes: default_progress_interval(),
            overwrite_uploads: true,
            overwrite_on_rename: false,
            known_hosts_file: None,
            audit_file: None,
            logging: LoggingConfig::default(),
            sites: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "connect_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.operation_timeout_secs == 0 {
            return Err(Error::Config(
                "operation_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.transfer_chunk_size == 0 {
            return Err(Error::Config(
                "transfer_chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.progress_interval_bytes == 0 {
            return Err(Error::Config(
                "progress_interval_bytes must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.id) {
                return Err(Error::Config(format!("Duplicate site id {}", site.id)));
            }
            if site.host.trim().is_empty() {
                return Err(Error::Config(format!("Site {} has no host", site.id)));
            }
            if site.username.trim().is_empty() {
                return Err(Error::Config(format!("Site {} has no username", site.id)));
            }
            if !site.target_root.starts_with('/') {
                return Err(Error::Config(format!(
                    "Site {} target_root must be absolute: {}",
                    site.id, site.target_root
                )));
            }
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_keepalive_interval() -> u32 {
    60
}

fn default_operation_timeout() -> u64 {
    300
}

fn default_transfer_chunk_size() -> usize {
    32 * 1024
}

fn default_progress_interval() -> u64 {
    256 * 1024
}

fn default_true() -> bool {
    true
}
