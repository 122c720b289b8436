//! HIL runner - hardware-in-the-loop regression tests for a secure bootloader
//!
//! Builds and flashes firmware variants with external tools, then watches
//! the device console log for the output that proves the bootloader chose
//! the expected image.

pub mod cli;
pub mod commands;
pub mod common;
pub mod exec;
pub mod expect;
pub mod runlog;
pub mod suite;
pub mod tail;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use suite::{run_suite, RunSettings, SuiteOptions, TestTable};
