//! CLI command definitions
//!
//! Defines the clap commands for the HIL runner.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the test groups against the target, stopping at the first failure
    Run {
        /// Test table (YAML); defaults to the configured or built-in table
        #[arg(long)]
        table: Option<PathBuf>,

        /// Console log of the device, as written by the terminal capture
        #[arg(long)]
        login: Option<PathBuf>,

        /// Run log transcript to write
        #[arg(long)]
        logout: Option<PathBuf>,

        /// Only run the group with this short name (repeatable)
        #[arg(long = "only", short = 'o')]
        only: Vec<String>,

        /// Seconds to wait for expected console output
        #[arg(long)]
        timeout: Option<u64>,

        /// Kill build/flash commands running longer than this many seconds
        #[arg(long)]
        command_timeout: Option<u64>,

        /// Images are already built: skip build commands
        #[arg(long)]
        prebuilt: bool,
    },

    /// List the groups and steps of a test table
    List {
        /// Test table (YAML); defaults to the configured or built-in table
        #[arg(long)]
        table: Option<PathBuf>,

        /// Output the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a test table and check that its programs are installed
    Check {
        /// Test table (YAML); defaults to the configured or built-in table
        #[arg(long)]
        table: Option<PathBuf>,
    },
}
