//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.
//!
//! ```toml
//! [device]
//! id = 0                  # omit to be asked at startup
//! poll_interval_ms = 10
//!
//! [display]
//! refresh_interval_ms = 50
//! format = "text"         # "text" or "json"
//!
//! [logging]
//! level = "info"
//! log_dir = ""            # empty = log to stderr
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MirrorError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Device selection and polling
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Device to open; `None` prompts on stdin.
    #[serde(default)]
    pub id: Option<i32>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Demo state output
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    #[serde(default = "default_format")]
    pub format: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub log_dir: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            format: default_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

// Default value functions
fn default_poll_interval_ms() -> u64 { 10 }

fn default_refresh_interval_ms() -> u64 { 50 }
fn default_format() -> String { "text".to_string() }

fn default_log_level() -> String { "info".to_string() }

/// Supported state line formats
pub const OUTPUT_FORMATS: [&str; 2] = ["text", "json"];

fn invalid(message: impl std::fmt::Display) -> MirrorError {
    MirrorError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joystick_mirror::config::Config;
    ///
    /// let config = Config::load("joystick-mirror.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Worker poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.device.poll_interval_ms)
    }

    /// Demo refresh interval
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.display.refresh_interval_ms)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if let Some(id) = self.device.id {
            if id < 0 {
                return Err(invalid("device id must not be negative"));
            }
        }

        if self.device.poll_interval_ms == 0 || self.device.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        if self.display.refresh_interval_ms == 0 || self.display.refresh_interval_ms > 60000 {
            return Err(invalid("refresh_interval_ms must be between 1 and 60000"));
        }

        if !OUTPUT_FORMATS.contains(&self.display.format.as_str()) {
            return Err(invalid("format must be one of: text, json"));
        }

        if tracing::Level::from_str(&self.logging.level).is_err() {
            return Err(invalid(format!(
                "log level '{}' must be one of: trace, debug, info, warn, error",
                self.logging.level
            )));
        }

        Ok(())
    }
}
