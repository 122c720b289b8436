//! Background console log follower

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::LineSplitter;
use crate::common::{Error, Result};

/// Read buffer size for each pass over new data
const READ_CHUNK: usize = 8192;

/// Follows a file that another process keeps appending to
///
/// Content present when the tailer is opened is never delivered: every run
/// only sees console output produced while it is running.
pub struct LogTailer {
    path: PathBuf,
    file: File,
    offset: u64,
    splitter: LineSplitter,
    poll_interval: Duration,
}

/// A running tailer task and the receiving end of its line queue
pub struct TailHandle {
    lines: mpsc::Receiver<String>,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl LogTailer {
    /// Open `path` and position at its current end
    pub async fn open(path: &Path, poll_interval: Duration) -> Result<Self> {
        let console_err = |source: std::io::Error| Error::ConsoleOpen {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).await.map_err(console_err)?;
        let offset = file.seek(SeekFrom::End(0)).await.map_err(console_err)?;
        tracing::debug!(path = %path.display(), offset, "Tailing console log");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            offset,
            splitter: LineSplitter::new(),
            poll_interval,
        })
    }

    /// Start following in a background task
    ///
    /// Lines go into a queue holding at most `capacity` entries; when it is
    /// full the task waits for the consumer. Cancelling `cancel` (or
    /// calling [`TailHandle::shutdown`]) stops the task at its next wait.
    pub fn spawn(self, capacity: usize, cancel: CancellationToken) -> TailHandle {
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(self.run(tx, cancel.clone()));
        TailHandle {
            lines: rx,
            cancel,
            task,
        }
    }

    async fn run(mut self, tx: mpsc::Sender<String>, cancel: CancellationToken) -> Result<()> {
        let result = self.follow(&tx, &cancel).await;
        match &result {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Console tailer stopped"),
            Err(e) => tracing::error!(path = %self.path.display(), "Console tailer failed: {}", e),
        }
        result
    }

    async fn follow(&mut self, tx: &mpsc::Sender<String>, cancel: &CancellationToken) -> Result<()> {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let n = self.read_chunk(&mut buf).await?;
            if n == 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
                continue;
            }

            // Hand over every line of this chunk before reading the next one,
            // so a full queue also stops the reads.
            for line in self.splitter.push(&buf[..n]) {
                tracing::trace!(line = %line, "console");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(()),
                    sent = tx.send(line) => {
                        if sent.is_err() {
                            // Nobody is listening any more.
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Read the next chunk appended since the last call, 0 at end of file
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_truncated().await?;
        let n = self.file.read(buf).await.map_err(|e| self.read_error(e))?;
        self.offset += n as u64;
        Ok(n)
    }

    /// Restart from the beginning if the capture tool truncated the file
    async fn check_truncated(&mut self) -> Result<()> {
        let len = self
            .file
            .metadata()
            .await
            .map_err(|e| self.read_error(e))?
            .len();
        if len < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                offset = self.offset,
                len,
                "Console log shrank, following from the start"
            );
            self.file
                .seek(SeekFrom::Start(0))
                .await
                .map_err(|e| self.read_error(e))?;
            self.offset = 0;
            self.splitter.reset();
        }
        Ok(())
    }

    fn read_error(&self, e: std::io::Error) -> Error {
        Error::FileRead {
            path: self.path.display().to_string(),
            error: e.to_string(),
        }
    }
}

impl TailHandle {
    /// The queue of console lines, in file order
    pub fn lines(&mut self) -> &mut mpsc::Receiver<String> {
        &mut self.lines
    }

    /// Stop the tailer and wait for it to exit
    ///
    /// Returns the error that stopped the tailer early, if any.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        drop(self.lines);
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Console tailer task panicked: {}", e)))?
    }
}
