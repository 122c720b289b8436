//! Error types for the HIL runner
//!
//! Every error is fatal to the run. Messages name the file, command or
//! expected string involved so the terminal line plus the run log are
//! enough to diagnose a failed regression.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the HIL runner
#[derive(Error, Debug)]
pub enum Error {
    // === File Access Errors ===
    #[error("Cannot open console log '{}': {source}. Is the terminal capture running?", .path.display())]
    ConsoleOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot create run log '{}': {source}", .path.display())]
    RunLogCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Command Errors ===
    #[error("Refusing to run an empty command vector")]
    EmptyCommand,

    #[error("Failed to start {command}: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Command {command} failed with {status}")]
    CommandFailed { command: String, status: ExitKind },

    #[error("Command {command} did not finish within {secs} seconds")]
    CommandTimeout { command: String, secs: u64 },

    // === Expectation Errors ===
    #[error("timeout, didn't receive expected string: {0:?}")]
    ExpectTimeout(String),

    #[error("Console log reader stopped while waiting for {0:?}")]
    ConsoleClosed(String),

    // === Table Errors ===
    #[error("Invalid test table: {0}")]
    InvalidTable(String),

    #[error("Failed to parse test table: {0}")]
    TableParse(String),

    #[error("Unknown test group '{name}'. Available: {available}")]
    UnknownGroup { name: String, available: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Suite Errors ===
    #[error("{group} step {step} ({phase}): {source}")]
    StepFailed {
        group: String,
        step: usize,
        phase: &'static str,
        #[source]
        source: Box<Error>,
    },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a failed command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Exited normally with a non-zero status
    Code(i32),
    /// Killed by a signal (no exit code available)
    Signal,
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Code(code) => write!(f, "exit code {}", code),
            ExitKind::Signal => write!(f, "termination by signal"),
        }
    }
}

impl Error {
    /// Wrap an error with the group/step/phase where the run stopped
    pub fn step_failed(group: &str, step: usize, phase: &'static str, source: Error) -> Self {
        Self::StepFailed {
            group: group.to_string(),
            step,
            phase,
            source: Box::new(source),
        }
    }

    /// Create an invalid table error
    pub fn invalid_table(reason: impl Into<String>) -> Self {
        Self::InvalidTable(reason.into())
    }

    /// The innermost error, skipping `StepFailed` wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_timeout_message() {
        let err = Error::ExpectTimeout("Hello World from hello1".to_string());
        assert_eq!(
            err.to_string(),
            "timeout, didn't receive expected string: \"Hello World from hello1\""
        );
    }

    #[test]
    fn test_step_failed_names_location_and_cause() {
        let err = Error::step_failed(
            "Good RSA",
            2,
            "expect",
            Error::ExpectTimeout("Hello World from hello1".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Good RSA step 2 (expect): "));
        assert!(msg.contains("\"Hello World from hello1\""));
        assert!(matches!(err.root(), Error::ExpectTimeout(_)));
    }

    #[test]
    fn test_command_failed_message() {
        let err = Error::CommandFailed {
            command: "[make flash_boot]".to_string(),
            status: ExitKind::Code(2),
        };
        assert_eq!(err.to_string(), "Command [make flash_boot] failed with exit code 2");
    }
}
