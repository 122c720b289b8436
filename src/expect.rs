//! Waiting for expected console output

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::common::{Error, Result};
use crate::runlog::RunLog;

/// Wait for a console line containing `needle`
///
/// Every line taken from the queue is recorded in the run log. Returns the
/// first matching line as soon as it arrives; anything queued behind it is
/// left for the next step. Fails with [`Error::ExpectTimeout`] once
/// `limit` has passed since the call, even if non-matching lines keep
/// arriving. A `limit` too large to represent as a deadline never expires.
pub async fn expect(
    lines: &mut mpsc::Receiver<String>,
    needle: &str,
    limit: Duration,
    log: &mut RunLog,
) -> Result<String> {
    log.expect(needle)?;
    let deadline = Instant::now().checked_add(limit);

    loop {
        let next = match deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return timed_out(needle, log);
                }
                match tokio::time::timeout_at(deadline, lines.recv()).await {
                    Ok(next) => next,
                    Err(_) => return timed_out(needle, log),
                }
            }
            None => lines.recv().await,
        };

        match next {
            Some(line) => {
                log.target(&line)?;
                if line.contains(needle) {
                    tracing::debug!(expected = needle, line = %line, "Matched console output");
                    return Ok(line);
                }
            }
            None => return Err(Error::ConsoleClosed(needle.to_string())),
        }
    }
}

fn timed_out(needle: &str, log: &mut RunLog) -> Result<String> {
    log.timeout()?;
    Err(Error::ExpectTimeout(needle.to_string()))
}
