//! A named destination: threshold, filters, formatter and medium

use super::appender::Appender;
use super::error::{LoggerError, Result};
use super::filter::Filter;
use super::formatter::Formatter;
use super::log_level::LogLevel;
use super::record::LogRecord;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// One output of the pipeline
///
/// A sink writes a record only when the record's level meets the sink's
/// threshold and every filter accepts it. The appender sits behind a mutex,
/// so direct producers on several threads may share a sink.
///
/// # Example
///
/// ```
/// use rust_json_logger::prelude::*;
///
/// let sink = Sink::new("errors", ConsoleAppender::stderr())
///     .with_level(LogLevel::Warning)
///     .with_formatter(JsonFormatter::new(FieldMapping::new().field("level", "levelname")));
/// assert_eq!(sink.level(), LogLevel::Warning);
/// ```
pub struct Sink {
    name: String,
    level: LogLevel,
    filters: Vec<Arc<dyn Filter>>,
    formatter: Formatter,
    appender: Mutex<Box<dyn Appender>>,
}

impl Sink {
    /// Sink with a DEBUG threshold, no filters and the default JSON formatter
    pub fn new<A: Appender + 'static>(name: impl Into<String>, appender: A) -> Self {
        Self::from_boxed(name, Box::new(appender))
    }

    pub fn from_boxed(name: impl Into<String>, appender: Box<dyn Appender>) -> Self {
        Self {
            name: name.into(),
            level: LogLevel::Debug,
            filters: Vec::new(),
            formatter: Formatter::default(),
            appender: Mutex::new(appender),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Attach a filter instance that other sinks may share
    #[must_use = "builder methods return a new value"]
    pub fn with_shared_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_formatter(mut self, formatter: impl Into<Formatter>) -> Self {
        self.formatter = formatter.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Threshold and filter check; no side effects
    pub fn accepts(&self, record: &LogRecord) -> bool {
        record.level >= self.level && self.filters.iter().all(|f| f.accepts(record))
    }

    /// Format and write one record
    ///
    /// Does not check [`Sink::accepts`]; the dispatcher does that first.
    pub fn handle(&self, record: &LogRecord) -> Result<()> {
        let line = self.formatter.format(record)?;
        self.appender.lock().append(&line)
    }

    pub fn flush(&self) -> Result<()> {
        self.appender.lock().flush()
    }

    /// Drain problems the appender recovered from
    pub fn take_warnings(&self) -> Vec<LoggerError> {
        self.appender.lock().take_warnings()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("filters", &self.filters.len())
            .field("formatter", &self.formatter)
            .field("appender", &self.appender.try_lock().map(|a| a.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::MemoryAppender;
    use crate::core::filter::NonErrorFilter;
    use crate::core::formatter::TextFormatter;

    #[test]
    fn test_threshold() {
        let sink = Sink::new("s", MemoryAppender::new()).with_level(LogLevel::Warning);
        assert!(!sink.accepts(&LogRecord::new("app", LogLevel::Info, "x")));
        assert!(sink.accepts(&LogRecord::new("app", LogLevel::Warning, "x")));
        assert!(sink.accepts(&LogRecord::new("app", LogLevel::Critical, "x")));
    }

    #[test]
    fn test_filters_must_all_pass() {
        let sink = Sink::new("s", MemoryAppender::new())
            .with_filter(NonErrorFilter)
            .with_filter(|r: &LogRecord| r.name.starts_with("app"));

        assert!(sink.accepts(&LogRecord::new("app", LogLevel::Info, "x")));
        assert!(!sink.accepts(&LogRecord::new("other", LogLevel::Info, "x")));
        assert!(!sink.accepts(&LogRecord::new("app", LogLevel::Error, "x")));
        assert_eq!(sink.filter_count(), 2);
    }

    #[test]
    fn test_handle_writes_formatted_line() {
        let memory = MemoryAppender::new();
        let sink = Sink::new("s", memory.clone())
            .with_formatter(TextFormatter::new("{levelname}: {message}"));

        sink.handle(&LogRecord::new("app", LogLevel::Info, "hello")).unwrap();
        assert_eq!(memory.lines(), vec!["INFO: hello".to_string()]);
    }

    #[test]
    fn test_handle_propagates_format_error() {
        let memory = MemoryAppender::new();
        let sink = Sink::new("s", memory.clone());
        let record = LogRecord::new("app", LogLevel::Info, "{missing}").with_args([1]);

        assert!(sink.handle(&record).is_err());
        assert!(memory.is_empty());
    }
}
