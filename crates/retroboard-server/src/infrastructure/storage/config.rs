//! TOML-based server configuration.
//!
//! ```toml
//! [display]
//! width = 64
//! height = 32
//! brightness = 100
//!
//! [manager]
//! state_path = "state.json"
//! idle_interval_ms = 100
//! advance_budget_ms = 250
//! default_program = "clock"
//! log_level = "info"
//!
//! [control]
//! bind_address = "0.0.0.0"
//! port = 5000
//! ```
//!
//! Every field has a `#[serde(default = "...")]` helper, so a partial file
//! (or no file at all) yields a working configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::manager::ManagerOptions;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` and `port` do not form a socket address.
    #[error("invalid control address `{0}`")]
    InvalidAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

/// Dimensions and initial brightness of the display surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
    /// Brightness in percent, used until a saved state overrides it.
    #[serde(default = "default_brightness")]
    pub brightness: u8,
}

/// Run loop and persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManagerConfig {
    /// Where the manager's snapshot is kept.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Longest sleep between two run-loop ticks.
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
    /// `advance` calls slower than this are logged.
    #[serde(default = "default_advance_budget_ms")]
    pub advance_budget_ms: u64,
    /// Program started on the very first launch.
    #[serde(default = "default_program", skip_serializing_if = "Option::is_none")]
    pub default_program: Option<String>,
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// WebSocket control endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlConfig {
    /// `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_width() -> usize {
    64
}
fn default_height() -> usize {
    32
}
fn default_brightness() -> u8 {
    100
}
fn default_state_path() -> PathBuf {
    PathBuf::from("state.json")
}
fn default_idle_interval_ms() -> u64 {
    100
}
fn default_advance_budget_ms() -> u64 {
    250
}
fn default_program() -> Option<String> {
    Some("clock".to_string())
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            brightness: default_brightness(),
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            idle_interval_ms: default_idle_interval_ms(),
            advance_budget_ms: default_advance_budget_ms(),
            default_program: default_program(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl ManagerConfig {
    /// Run-loop timing derived from this section.
    pub fn options(&self) -> ManagerOptions {
        ManagerOptions {
            idle_interval: Duration::from_millis(self.idle_interval_ms.max(1)),
            advance_budget: Duration::from_millis(self.advance_budget_ms),
        }
    }
}

impl ControlConfig {
    /// The socket address the control server binds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `bind_address` is not an IP
    /// address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.bind_address, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `ServerConfig` from `path`, returning the defaults if the file does
/// not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: ServerConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
