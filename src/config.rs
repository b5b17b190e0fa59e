//! Application configuration module
//!
//! This module centralizes the diff and rollback defaults using `confy`
//! for automatic serialization and OS-specific config directory management.

use crate::constant::{APP_NAME, DEFAULT_CONTEXT_LINES, DEFAULT_CUTOFF_HOURS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Confy(#[from] confy::ConfyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: Settings,
}

impl Config {
    /// Load configuration from disk, creating default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let settings: Settings = confy::load(APP_NAME, None)?;
        info!("Load config from {:?}", Self::config_path()?);
        Ok(Self { settings })
    }

    /// Load configuration, falling back to defaults when the file is unreadable
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save current configuration to disk
    pub fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, None, &self.settings)?;
        info!("Save config to {:?}", Self::config_path()?);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(confy::get_configuration_file_path(APP_NAME, None)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Unchanged lines kept around each change when collapsing
    #[serde(default = "default_context_lines")]
    pub default_context_lines: usize,

    /// Collapse unchanged runs by default
    #[serde(default = "default_true")]
    pub show_only_changes: bool,

    /// Default rollback cutoff, in hours before now
    #[serde(default = "default_cutoff_hours")]
    pub default_cutoff_hours: i64,

    /// Upper bound on a single diff computation in milliseconds (0 = unbounded).
    /// When exceeded the result is still a valid but possibly non-minimal script.
    #[serde(default)]
    pub diff_timeout_ms: u64,

    /// Maximum log level: error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Settings {
    pub fn diff_timeout(&self) -> Option<Duration> {
        (self.diff_timeout_ms > 0).then(|| Duration::from_millis(self.diff_timeout_ms))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_context_lines: DEFAULT_CONTEXT_LINES,
            show_only_changes: true,
            default_cutoff_hours: DEFAULT_CUTOFF_HOURS,
            diff_timeout_ms: 0,
            log_level: default_log_level(),
        }
    }
}

fn default_context_lines() -> usize {
    DEFAULT_CONTEXT_LINES
}

fn default_true() -> bool {
    true
}

fn default_cutoff_hours() -> i64 {
    DEFAULT_CUTOFF_HOURS
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.default_context_lines, 3);
        assert!(settings.show_only_changes);
        assert_eq!(settings.diff_timeout(), None);
    }

    #[test]
    fn diff_timeout_converts_millis() {
        let settings = Settings {
            diff_timeout_ms: 250,
            ..Settings::default()
        };
        assert_eq!(settings.diff_timeout(), Some(Duration::from_millis(250)));
    }
}
