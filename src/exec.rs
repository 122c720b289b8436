//! External command execution
//!
//! Build and flash tools are opaque: only their exit status matters.
//! Their combined output goes to the run log, never back to the caller.

use std::process::Stdio;
use std::time::Duration;

use colored::Colorize;
use tokio::process::Command;

use crate::common::{display_command, Error, ExitKind, Result};
use crate::runlog::RunLog;

/// Run each command in order, stopping at the first failure
pub async fn run_commands<S: AsRef<[String]>>(
    commands: &[S],
    log: &mut RunLog,
    limit: Option<Duration>,
) -> Result<()> {
    for argv in commands {
        let argv = argv.as_ref();
        println!("    {}", display_command(argv).dimmed());
        run_command(argv, log, limit).await?;
    }
    Ok(())
}

/// Run one command vector to completion
///
/// `argv[0]` is executed directly with the rest as arguments; there is no
/// shell in between. Without a `limit` a hung tool blocks forever. With
/// one, the child is killed once the limit passes.
pub async fn run_command(argv: &[String], log: &mut RunLog, limit: Option<Duration>) -> Result<()> {
    let (program, args) = argv.split_first().ok_or(Error::EmptyCommand)?;
    let command = display_command(argv);

    log.run(&command)?;
    let (stdout, stderr) = log.child_stdio()?;

    tracing::debug!(command = %command, "Spawning command");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::CommandSpawn {
            command: command.clone(),
            source,
        })?;

    let status = match limit {
        None => child.wait().await?,
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!(command = %command, secs = limit.as_secs(), "Command timed out; killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(command = %command, "Failed to kill command: {}", e);
                }
                return Err(Error::CommandTimeout {
                    command,
                    secs: limit.as_secs(),
                });
            }
        },
    };

    if status.success() {
        tracing::debug!(command = %command, "Command succeeded");
        Ok(())
    } else {
        let status = match status.code() {
            Some(code) => ExitKind::Code(code),
            None => ExitKind::Signal,
        };
        Err(Error::CommandFailed { command, status })
    }
}
