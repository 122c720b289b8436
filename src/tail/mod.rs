//! Console log tailing
//!
//! The device console is captured to a file by an external terminal
//! program. [`LogTailer`] follows that file from its end at startup and
//! hands each completed line to the matcher through a bounded queue.

mod splitter;
mod tailer;

pub use splitter::LineSplitter;
pub use tailer::{LogTailer, TailHandle};
