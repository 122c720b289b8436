//! HIL runner - hardware-in-the-loop regression tests for a secure bootloader
//!
//! Runs a table of build/flash/expect steps against a real device whose
//! serial console is captured to a file, e.g.
//! `picocom -b 115200 /dev/ttyACM0 | tee /tmp/zephyr.out`.

use std::path::PathBuf;

use clap::Parser;
use hil_runner::common::{config::Config, logging};
use hil_runner::{cli, commands::Commands, Result};

#[derive(Parser)]
#[command(name = "hil-runner", about = "Hardware-in-the-loop bootloader test runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write diagnostic logs to this file
    #[arg(long, global = true)]
    trace_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let guard = match logging::init_cli(cli.verbose, cli.trace_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        // exit() skips destructors; flush the trace file first.
        drop(guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli::dispatch(cli.command, &config).await
}
