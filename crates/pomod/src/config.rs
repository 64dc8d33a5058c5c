//! Daemon configuration.
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults
//! 2. `pomod.toml` in the platform config directory (`~/.config/pomo/` on Linux)
//! 3. Environment variables `POMO_SOCKET` and `POMO_DATA`
//!
//! Every field in the file is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::server::DEFAULT_SOCKET_PATH;
use crate::timer::TimerOptions;

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "POMO_SOCKET";

/// Environment variable overriding the data file.
pub const DATA_ENV: &str = "POMO_DATA";

const CONFIG_FILE: &str = "pomod.toml";
const DATA_FILE: &str = "pomo.json";
const APP_DIR: &str = "pomo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Effective daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Unix socket clients connect to.
    pub socket_path: PathBuf,

    /// JSON file holding all persisted timer state.
    pub data_file: PathBuf,

    /// Countdown tick period in milliseconds.
    pub tick_interval_ms: u64,

    /// Period of the daily-boundary check in seconds.
    pub daily_check_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            data_file: default_data_file(),
            tick_interval_ms: 1000,
            daily_check_interval_secs: 60,
        }
    }
}

impl DaemonConfig {
    /// Loads the config file from the default location (if it exists) and
    /// applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match default_config_file() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parses a config file. Environment overrides are not applied.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Loaded daemon config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Applies `POMO_SOCKET` / `POMO_DATA` through the given lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(socket) = lookup(SOCKET_ENV).filter(|v| !v.is_empty()) {
            self.socket_path = PathBuf::from(socket);
        }
        if let Some(data) = lookup(DATA_ENV).filter(|v| !v.is_empty()) {
            self.data_file = PathBuf::from(data);
        }
    }

    pub fn timer_options(&self) -> TimerOptions {
        TimerOptions {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            daily_check_interval: Duration::from_secs(self.daily_check_interval_secs),
        }
    }
}

/// `<config dir>/pomo/pomod.toml`, if the platform has a config dir.
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

fn default_data_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join(DATA_FILE)
}
