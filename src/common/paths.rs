//! Default file locations
//!
//! The console log default matches a capture set up with something like
//! `picocom -b 115200 /dev/ttyACM0 | tee /tmp/zephyr.out`.

use std::path::PathBuf;

/// Name used for the configuration directory
const APP_NAME: &str = "hil-runner";

/// Default path of the device console log written by the terminal capture tool
pub const DEFAULT_CONSOLE_LOG: &str = "/tmp/zephyr.out";

/// Default path of the run log transcript, relative to the working directory
pub const DEFAULT_RUN_LOG: &str = "tests.log";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/hil-runner/`
/// - macOS: `~/Library/Application Support/hil-runner/`
/// - Windows: `%APPDATA%\hil-runner\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
