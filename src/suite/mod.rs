//! HIL suite execution
//!
//! Wires the pieces together for one run: the console tailer in the
//! background, the run log, and the driver walking the test table.

mod driver;
mod table;

pub use driver::{StepPhase, SuiteDriver, SuiteOptions, SuiteState, SuiteSummary};
pub use table::{CommandVector, TestGroup, TestStep, TestTable};

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::common::{Error, Result};
use crate::runlog::RunLog;
use crate::tail::LogTailer;

/// Everything needed for one run besides the table
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Console log written by the terminal capture tool
    pub console_log: PathBuf,
    /// Run log transcript to create
    pub run_log: PathBuf,
    /// Delay between console log polls at end of file
    pub poll_interval: Duration,
    /// Console lines buffered ahead of the matcher
    pub queue_capacity: usize,
    /// Group ids to run; empty runs all of them
    pub only: Vec<String>,
    pub options: SuiteOptions,
}

/// Run the selected groups of `table` against the target
///
/// Fails before any step runs if the selection is invalid, the console log
/// cannot be opened or the run log cannot be created. The console tailer
/// is stopped before returning, whatever the outcome.
pub async fn run_suite(table: &TestTable, settings: &RunSettings) -> Result<SuiteSummary> {
    let groups = table.select(&settings.only)?;

    let tailer = LogTailer::open(&settings.console_log, settings.poll_interval).await?;
    let log = RunLog::create(&settings.run_log)?;
    tracing::info!(
        console = %settings.console_log.display(),
        run_log = %settings.run_log.display(),
        groups = groups.len(),
        "Starting suite"
    );

    let mut tail = tailer.spawn(settings.queue_capacity, CancellationToken::new());
    let mut driver = SuiteDriver::new(log, settings.options.clone());
    let result = driver.run(&groups, tail.lines()).await;

    merge_outcome(result, tail.shutdown().await)
}

/// Combine the driver's result with the tailer's exit status
///
/// A queue closed under the matcher is explained by the tailer's own
/// error, reported at the step the driver was on.
fn merge_outcome(result: Result<SuiteSummary>, tail: Result<()>) -> Result<SuiteSummary> {
    match (tail, result) {
        (Ok(()), result) => result,
        (Err(tail_err), Ok(summary)) => {
            tracing::warn!("Console tailer failed after the last step: {}", tail_err);
            Ok(summary)
        }
        (Err(tail_err), Err(e)) => {
            if !matches!(e.root(), Error::ConsoleClosed(_)) {
                tracing::warn!("Console tailer also failed: {}", tail_err);
                return Err(e);
            }
            match e {
                Error::StepFailed {
                    group, step, phase, ..
                } => Err(Error::step_failed(&group, step, phase, tail_err)),
                _ => Err(tail_err),
            }
        }
    }
}
