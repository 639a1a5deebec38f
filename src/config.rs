//! Application configuration.
//!
//! The configuration is loaded from `$XDG_CONFIG_HOME/linebar/config.json`.
//! Every section and field is optional; a missing file means defaults.
//! The port can additionally be overridden by the first positional
//! command-line argument, see [`port_from_arg`].
//!
//! # Example
//!
//! ```json
//! {
//!   "server": { "host": "127.0.0.1", "port": 65432 },
//!   "display": {
//!     "font_family": "Lucida Grande",
//!     "font_size": 11.0,
//!     "tooltip": "linebar",
//!     "poll_ms": 16
//!   }
//! }
//! ```

use crate::ipc::listener::{DEFAULT_HOST, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the line server listens.
    #[serde(default)]
    pub server: ServerConfig,

    /// How the status label looks.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Listening socket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.  Use `"0.0.0.0"` to accept remote senders.
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Status label settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub font_family: String,
    /// Font size in points.
    pub font_size: f64,
    /// Tooltip shown when hovering the label.
    pub tooltip: String,
    /// How often the display drains new lines (ms).
    pub poll_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            font_family: "Lucida Grande".into(),
            font_size: 11.0,
            tooltip: "linebar".into(),
            poll_ms: 16,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

/// Resolve the config directory (`$XDG_CONFIG_HOME/linebar`).
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("linebar")
}

/// Interpret a port argument the way a lenient integer coercion would:
/// leading ASCII digits are read, anything after them is ignored.
///
/// Returns `None` when the argument is absent, has no leading digits, is
/// zero, or does not fit in a port number.  Callers fall back to the
/// configured port in that case.
pub fn port_from_arg(arg: Option<&str>) -> Option<u16> {
    let arg = arg?.trim_start();
    let digits: &str = match arg.find(|c: char| !c.is_ascii_digit()) {
        Some(end) => &arg[..end],
        None => arg,
    };
    match digits.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}
