//! Appender trait for sink media

use super::error::{LoggerError, Result};

/// The medium a sink writes formatted records to
///
/// Appenders receive one already-formatted record per call and add the
/// line terminator themselves. A sink serializes access to its appender,
/// so implementations need no locking of their own.
pub trait Appender: Send {
    fn append(&mut self, formatted: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;

    /// Problems the appender recovered from since the last call
    fn take_warnings(&mut self) -> Vec<LoggerError> {
        Vec::new()
    }
}
