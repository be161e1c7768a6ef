//! Fluent construction of a single record
//!
//! Returned by [`Logger::record`]. When the level is below the logger's
//! minimum the builder is inert and every call is a no-op.

use super::error::LoggerError;
use super::field_value::{ExtraFields, FieldValue};
use super::logger::Logger;
use super::record::{ErrorInfo, LogRecord};

/// Builder for one log record
///
/// # Example
///
/// ```
/// use rust_json_logger::prelude::*;
///
/// let memory = MemoryAppender::new();
/// let logger = Logger::builder().sink(Sink::new("m", memory.clone())).build()?;
/// let err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.json");
///
/// logger.record(LogLevel::Error, "Could not load {}")
///     .arg("config.json")
///     .extra("path", "/etc/app/config.json")
///     .exc_info(&err)
///     .emit();
///
/// let line = &memory.lines()[0];
/// assert!(line.contains("\"message\":\"Could not load config.json\""));
/// assert!(line.contains("\"exc_info\""));
/// # Ok::<(), LoggerError>(())
/// ```
#[must_use = "a record is only logged once `emit` is called"]
pub struct RecordBuilder<'a> {
    logger: &'a Logger,
    record: Option<LogRecord>,
}

impl<'a> RecordBuilder<'a> {
    pub(crate) fn new(logger: &'a Logger, record: LogRecord) -> Self {
        Self {
            logger,
            record: Some(record),
        }
    }

    pub(crate) fn disabled(logger: &'a Logger) -> Self {
        Self { logger, record: None }
    }

    /// True if `emit` will hand the record to the logger
    pub fn is_enabled(&self) -> bool {
        self.record.is_some()
    }

    fn map(mut self, f: impl FnOnce(LogRecord) -> LogRecord) -> Self {
        self.record = self.record.take().map(f);
        self
    }

    /// Next positional argument for the message template
    pub fn arg(self, value: impl Into<FieldValue>) -> Self {
        self.map(|record| record.with_args([value.into()]))
    }

    pub fn args<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.map(|record| record.with_args(values))
    }

    /// Add an extra field
    ///
    /// A key that names a built-in attribute is left out of the record and
    /// reported on the fallback channel; the record is still logged.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        if let Some(record) = self.record.as_mut() {
            if let Err(e) = record.insert_extra(key, value) {
                self.reject(&e);
            }
        }
        self
    }

    pub fn extras(mut self, fields: ExtraFields) -> Self {
        if let Some(record) = self.record.as_mut() {
            let mut rejected = Vec::new();
            for (key, value) in fields.iter() {
                if let Err(e) = record.insert_extra(key, value.clone()) {
                    rejected.push(e);
                }
            }
            for e in &rejected {
                self.reject(e);
            }
        }
        self
    }

    fn reject(&self, error: &LoggerError) {
        let name = self.record.as_ref().map_or("", |r| r.name.as_str());
        self.logger.report(&format!(
            "[LOGGER WARNING] Dropped extra field on record from '{}': {}",
            name, error
        ));
    }

    /// Attach an error and its source chain
    pub fn exc_info<E>(self, error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        self.map(|record| record.with_exc_info(ErrorInfo::from_error(error)))
    }

    pub fn error_info(self, info: ErrorInfo) -> Self {
        self.map(|record| record.with_exc_info(info))
    }

    pub fn stack_info(self, stack: impl Into<String>) -> Self {
        self.map(|record| record.with_stack_info(stack))
    }

    /// Capture the current call stack
    pub fn capture_stack(self) -> Self {
        self.map(LogRecord::with_captured_stack)
    }

    /// Set source location information
    pub fn location(self, file: &str, line: u32, module_path: &str) -> Self {
        self.map(|record| record.with_location(file, line, module_path))
    }

    /// Build and send the record
    pub fn emit(self) {
        if let Some(record) = self.record {
            self.logger.emit(record);
        }
    }
}
