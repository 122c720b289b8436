//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{config_path, DEFAULT_CONSOLE_LOG, DEFAULT_RUN_LOG};
use super::Result;

/// Largest timeout accepted anywhere, in seconds (one day)
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Console log tailing settings
    #[serde(default)]
    pub tail: TailConfig,
}

/// File locations
#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    /// Console log written by the terminal capture tool
    #[serde(default = "default_console_log")]
    pub console_log: PathBuf,

    /// Run log transcript, recreated on every run
    #[serde(default = "default_run_log")]
    pub run_log: PathBuf,

    /// Test table to use instead of the built-in one
    #[serde(default)]
    pub table: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            console_log: default_console_log(),
            run_log: default_run_log(),
            table: None,
        }
    }
}

fn default_console_log() -> PathBuf {
    PathBuf::from(DEFAULT_CONSOLE_LOG)
}

fn default_run_log() -> PathBuf {
    PathBuf::from(DEFAULT_RUN_LOG)
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// How long a step waits for its expected console output
    #[serde(default = "default_expect")]
    pub expect_secs: u64,

    /// Upper bound for a single build/flash command; unset waits forever
    #[serde(default)]
    pub command_secs: Option<u64>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            expect_secs: default_expect(),
            command_secs: None,
        }
    }
}

fn default_expect() -> u64 {
    10
}

/// Console log tailing settings
#[derive(Debug, Deserialize)]
pub struct TailConfig {
    /// Delay between reads once the end of the console log is reached
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Lines buffered between the tailer and the matcher
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_poll_interval() -> u64 {
    250
}
fn default_queue_capacity() -> usize {
    30
}

impl Timeouts {
    pub fn expect(&self) -> Duration {
        Duration::from_secs(self.expect_secs)
    }

    pub fn command(&self) -> Option<Duration> {
        self.command_secs.map(Duration::from_secs)
    }
}

impl TailConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        if config.tail.queue_capacity == 0 {
            return Err(super::Error::Config(
                "tail.queue_capacity must be at least 1".to_string(),
            ));
        }
        if config.timeouts.expect_secs == 0 || config.timeouts.expect_secs > MAX_TIMEOUT_SECS {
            return Err(super::Error::Config(format!(
                "timeouts.expect_secs must be between 1 and {}",
                MAX_TIMEOUT_SECS
            )));
        }
        if matches!(config.timeouts.command_secs, Some(secs) if secs == 0 || secs > MAX_TIMEOUT_SECS) {
            return Err(super::Error::Config(format!(
                "timeouts.command_secs must be between 1 and {}",
                MAX_TIMEOUT_SECS
            )));
        }
        Ok(config)
    }
}
