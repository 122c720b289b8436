//! Byte chunk to line splitting

/// Reassembles lines from arbitrary byte chunks
///
/// A chunk may end mid-line because the writer is racing with us. The
/// unterminated tail is held back and prefixed onto the next chunk, so
/// each line comes out exactly once and intact.
#[derive(Debug, Default)]
pub struct LineSplitter {
    partial: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completes
    ///
    /// The `\n` terminator is stripped, as is a `\r` before it. Bytes that
    /// are not valid UTF-8 are replaced rather than rejected.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.partial[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let mut record = &self.partial[start..end];
            if let Some(stripped) = record.strip_suffix(b"\r") {
                record = stripped;
            }
            lines.push(String::from_utf8_lossy(record).into_owned());
            start = end + 1;
        }
        self.partial.drain(..start);
        lines
    }

    /// Bytes of the line currently being assembled
    #[cfg(test)]
    fn pending(&self) -> &[u8] {
        &self.partial
    }

    /// Drop any held fragment
    pub fn reset(&mut self) {
        self.partial.clear();
    }
}
