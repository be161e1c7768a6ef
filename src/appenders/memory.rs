//! In-memory appender

use crate::core::{Appender, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Keeps formatted records in a shared buffer
///
/// Clones share the buffer, so a clone kept by the caller sees every line
/// written through the sink.
///
/// ```
/// use rust_json_logger::{Logger, MemoryAppender, Sink};
///
/// let memory = MemoryAppender::new();
/// let logger = Logger::builder()
///     .sink(Sink::new("capture", memory.clone()))
///     .build()?;
/// logger.info("captured");
/// assert_eq!(memory.len(), 1);
/// # Ok::<(), rust_json_logger::LoggerError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryAppender {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryAppender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl Appender for MemoryAppender {
    fn append(&mut self, formatted: &str) -> Result<()> {
        self.lines.lock().push(formatted.to_string());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
