//! G-code chunk buffer.
//!
//! Emitted lines accumulate in order until a flush point (a stack break or
//! program end) hands them to the driver as one newline-joined segment. The
//! buffer records the statement index at which the current chunk began so
//! driver-reported segment-relative line numbers can be projected back onto
//! the source program.

use tracing::trace;

#[derive(Debug, Default)]
pub struct ChunkBuffer {
    lines: Vec<String>,
    start: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, line: String) {
        trace!(target: "interp.chunk", line = %line, "emit");
        self.lines.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Statement index at which the current chunk began.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn set_start(&mut self, pc: usize) {
        self.start = pc;
    }

    /// Drain the buffer into a newline-joined segment; `None` when empty.
    /// Clearing is atomic with the join: after this call the buffer is ready
    /// for the next chunk.
    pub fn take(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let joined = self.lines.join("\n");
        self.lines.clear();
        Some(joined)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_joins_in_emission_order() {
        let mut chunk = ChunkBuffer::new();
        chunk.emit("G1X1 F60".into());
        chunk.emit("G1X2 F60".into());
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.take().unwrap(), "G1X1 F60\nG1X2 F60");
        assert!(chunk.is_empty());
    }

    #[test]
    fn take_on_empty_is_none() {
        let mut chunk = ChunkBuffer::new();
        assert_eq!(chunk.take(), None);
    }

    #[test]
    fn start_index_tracks_chunk_origin() {
        let mut chunk = ChunkBuffer::new();
        assert_eq!(chunk.start(), 0);
        chunk.set_start(17);
        assert_eq!(chunk.start(), 17);
    }
}
