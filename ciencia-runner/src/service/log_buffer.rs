//! Log buffer
//!
//! Collects engine output between flushes. Reader tasks push lines as they
//! arrive; the watcher periodically drains the buffer into the run record.

use parking_lot::Mutex;
use std::sync::Arc;

/// Thread-safe buffer of captured output
///
/// Cloning shares the same underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    buffer: Arc<Mutex<String>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line, adding the trailing newline when missing
    pub fn push_line(&self, line: &str) {
        let mut buffer = self.buffer.lock();
        buffer.push_str(line);
        if !line.ends_with('\n') {
            buffer.push('\n');
        }
    }

    /// Takes everything buffered so far, leaving the buffer empty
    pub fn drain(&self) -> String {
        std::mem::take(&mut *self.buffer.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let buffer = LogBuffer::new();
        assert!(buffer.is_empty());

        buffer.push_line("first");
        buffer.push_line("second\n");
        assert_eq!(buffer.drain(), "first\nsecond\n");
        assert!(buffer.is_empty());
        assert_eq!(buffer.drain(), "");
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = LogBuffer::new();
        let writer = buffer.clone();

        writer.push_line("from writer");
        assert_eq!(buffer.drain(), "from writer\n");
        assert!(writer.is_empty());
    }
}
