//! Run log transcript
//!
//! One file per run recording every command, every console line observed
//! while waiting, and each step verdict. Child processes write their
//! output straight into the same file through duplicated handles, so the
//! buffer is flushed before each spawn to keep records in order.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::common::{Error, Result};

/// Append-only transcript of a single run
pub struct RunLog {
    path: PathBuf,
    out: BufWriter<File>,
}

impl RunLog {
    /// Create (or truncate) the run log at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| Error::RunLogCreate {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Group boundary marker
    pub fn group_start(&mut self, name: &str) -> Result<()> {
        self.line(format_args!("-------------------------------------"))?;
        self.line(format_args!("---- Running {:?}", name))
    }

    pub fn group_passed(&mut self, name: &str) -> Result<()> {
        self.line(format_args!("---- Group passed: {:?}", name))
    }

    /// Record a command about to be executed
    pub fn run(&mut self, command: &str) -> Result<()> {
        self.line(format_args!("---- Run: {}", command))
    }

    pub fn skipped(&mut self, command: &str) -> Result<()> {
        self.line(format_args!("---- Skip (prebuilt): {}", command))
    }

    pub fn expect(&mut self, needle: &str) -> Result<()> {
        self.line(format_args!("---- expect: {:?}", needle))
    }

    /// Record a console line observed while waiting
    pub fn target(&mut self, line: &str) -> Result<()> {
        self.line(format_args!("---- target: {:?}", line))
    }

    pub fn timeout(&mut self) -> Result<()> {
        self.line(format_args!("timeout, didn't receive output"))
    }

    pub fn passed(&mut self) -> Result<()> {
        self.line(format_args!("---- Passed"))
    }

    pub fn failed(&mut self, error: &Error) -> Result<()> {
        self.line(format_args!("---- Failed: {}", error))
    }

    /// Stdout/stderr handles that write into this log
    ///
    /// Both handles share the file offset with the buffered writer, so
    /// child output lands after everything logged so far.
    pub fn child_stdio(&mut self) -> Result<(Stdio, Stdio)> {
        self.out.flush()?;
        let file = self.out.get_ref();
        Ok((Stdio::from(file.try_clone()?), Stdio::from(file.try_clone()?)))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.out.write_fmt(args)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::warn!("Failed to flush run log {}: {}", self.path.display(), e);
        }
    }
}
