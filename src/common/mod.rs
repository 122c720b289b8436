//! Common utilities shared by the CLI and the suite engine

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, ExitKind, Result};

/// Render a command vector the way it appears in transcripts: `[make flash_boot]`
pub fn display_command<S: AsRef<str>>(argv: &[S]) -> String {
    let parts: Vec<&str> = argv.iter().map(|s| s.as_ref()).collect();
    format!("[{}]", parts.join(" "))
}
