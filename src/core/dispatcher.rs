//! Routes records to an ordered set of sinks
//!
//! **Per-Sink Panic Isolation**: every sink call is wrapped in
//! `catch_unwind`, so a sink that fails or panics never prevents later sinks
//! from receiving the record, and never reaches the producer.

use super::error::{LoggerError, Result};
use super::fallback::{panic_message, stderr_fallback, FallbackHandler};
use super::metrics::PipelineMetrics;
use super::record::LogRecord;
use super::sink::Sink;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Ordered registry of sinks
///
/// # Example
///
/// ```
/// use rust_json_logger::prelude::*;
///
/// let memory = MemoryAppender::new();
/// let dispatcher = Dispatcher::new()
///     .with_sink(Sink::new("info", memory.clone()).with_filter(NonErrorFilter));
///
/// dispatcher.emit(&LogRecord::new("app", LogLevel::Info, "kept"));
/// dispatcher.emit(&LogRecord::new("app", LogLevel::Error, "skipped"));
/// assert_eq!(memory.len(), 1);
/// ```
pub struct Dispatcher {
    sinks: Vec<Arc<Sink>>,
    fallback: FallbackHandler,
    metrics: Arc<PipelineMetrics>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            fallback: stderr_fallback(),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.add_sink(sink);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_fallback(mut self, fallback: FallbackHandler) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Register a sink after the ones already present
    pub fn add_sink(&mut self, sink: impl Into<Arc<Sink>>) {
        self.sinks.push(sink.into());
    }

    pub fn sinks(&self) -> &[Arc<Sink>] {
        &self.sinks
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Send a line to the fallback channel
    pub fn report(&self, message: &str) {
        (self.fallback)(message);
    }

    pub(crate) fn fallback(&self) -> &FallbackHandler {
        &self.fallback
    }

    /// Deliver one record to every accepting sink, flushing each one written
    pub fn emit(&self, record: &LogRecord) {
        for sink in &self.sinks {
            if self.deliver(sink, record) {
                self.flush_sink(sink);
            }
        }
    }

    /// Deliver a run of records in order, then flush each sink once
    pub fn emit_batch(&self, records: &[LogRecord]) {
        for record in records {
            for sink in &self.sinks {
                self.deliver(sink, record);
            }
        }
        for sink in &self.sinks {
            self.flush_sink(sink);
        }
    }

    /// Flush every sink; failures are reported and the first one returned
    pub fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = self.flush_sink(sink) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Returns true if the sink wrote the record
    fn deliver(&self, sink: &Sink, record: &LogRecord) -> bool {
        if !sink.accepts(record) {
            self.metrics.record_filtered();
            return false;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| sink.handle(record)));
        for warning in sink.take_warnings() {
            self.report(&format!(
                "[LOGGER WARNING] Sink '{}' recovered: {}",
                sink.name(),
                warning
            ));
        }

        match outcome {
            Ok(Ok(())) => {
                self.metrics.record_delivered();
                true
            }
            Ok(Err(e)) => {
                self.metrics.record_sink_failure();
                self.report(&format!(
                    "[LOGGER ERROR] Sink '{}' failed to write record from '{}': {}",
                    sink.name(),
                    record.name,
                    e
                ));
                false
            }
            Err(panic_info) => {
                self.metrics.record_sink_failure();
                self.report(&format!(
                    "[LOGGER CRITICAL] Sink '{}' panicked: {}. Other sinks continue to function.",
                    sink.name(),
                    panic_message(panic_info.as_ref())
                ));
                false
            }
        }
    }

    fn flush_sink(&self, sink: &Sink) -> Result<()> {
        let result = match catch_unwind(AssertUnwindSafe(|| sink.flush())) {
            Ok(result) => result,
            Err(panic_info) => Err(LoggerError::sink_write(
                sink.name(),
                format!("panicked during flush: {}", panic_message(panic_info.as_ref())),
            )),
        };
        if let Err(e) = &result {
            self.report(&format!("[LOGGER ERROR] Sink '{}' flush failed: {}", sink.name(), e));
        }
        result
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sinks", &self.sinks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::MemoryAppender;
    use crate::core::appender::Appender;
    use crate::core::filter::NonErrorFilter;
    use crate::core::formatter::TextFormatter;
    use crate::core::log_level::LogLevel;
    use parking_lot::Mutex;

    struct FailingAppender;

    impl Appender for FailingAppender {
        fn append(&mut self, _formatted: &str) -> Result<()> {
            Err(LoggerError::sink_write("failing", "disk on fire"))
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct PanickingAppender;

    impl Appender for PanickingAppender {
        fn append(&mut self, _formatted: &str) -> Result<()> {
            panic!("Intentional panic for testing");
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn capture() -> (FallbackHandler, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let handler: FallbackHandler = Arc::new(move |msg: &str| sink.lock().push(msg.to_string()));
        (handler, lines)
    }

    fn text() -> TextFormatter {
        TextFormatter::new("{levelname} {message}")
    }

    #[test]
    fn test_split_by_severity() {
        let info = MemoryAppender::new();
        let errors = MemoryAppender::new();
        let dispatcher = Dispatcher::new()
            .with_sink(Sink::new("stdout", info.clone()).with_filter(NonErrorFilter).with_formatter(text()))
            .with_sink(
                Sink::new("stderr", errors.clone())
                    .with_level(LogLevel::Warning)
                    .with_formatter(text()),
            );

        for level in LogLevel::ALL {
            dispatcher.emit(&LogRecord::new("app", level, "m"));
        }

        assert_eq!(info.lines(), vec!["DEBUG m", "INFO m"]);
        assert_eq!(errors.lines(), vec!["WARNING m", "ERROR m", "CRITICAL m"]);
        assert_eq!(dispatcher.metrics().delivered(), 5);
        assert_eq!(dispatcher.metrics().filtered(), 5);
    }

    #[test]
    fn test_sink_error_does_not_stop_later_sinks() {
        let (fallback, reports) = capture();
        let memory = MemoryAppender::new();
        let dispatcher = Dispatcher::new()
            .with_fallback(fallback)
            .with_sink(Sink::new("bad", FailingAppender))
            .with_sink(Sink::new("good", memory.clone()));

        dispatcher.emit(&LogRecord::new("app", LogLevel::Info, "still delivered"));

        assert_eq!(memory.len(), 1);
        assert_eq!(dispatcher.metrics().sink_failures(), 1);
        let reports = reports.lock();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("Sink 'bad'"));
        assert!(reports[0].contains("disk on fire"));
    }

    #[test]
    fn test_sink_panic_is_isolated() {
        let (fallback, reports) = capture();
        let memory = MemoryAppender::new();
        let dispatcher = Dispatcher::new()
            .with_fallback(fallback)
            .with_sink(Sink::new("panics", PanickingAppender))
            .with_sink(Sink::new("good", memory.clone()));

        dispatcher.emit(&LogRecord::new("app", LogLevel::Info, "one"));
        dispatcher.emit(&LogRecord::new("app", LogLevel::Info, "two"));

        assert_eq!(memory.len(), 2);
        assert_eq!(dispatcher.metrics().sink_failures(), 2);
        assert!(reports.lock()[0].contains("Intentional panic for testing"));
    }

    #[test]
    fn test_rotation_failure_reaches_fallback() {
        use crate::appenders::{RotatingFileAppender, RotationPolicy};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let blocker = dir.path().join("app.log.1");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let appender = RotatingFileAppender::with_policy(
            &path,
            RotationPolicy::new().with_max_size(40).with_max_backups(1),
        )
        .unwrap();
        let (fallback, reports) = capture();
        let dispatcher = Dispatcher::new()
            .with_fallback(fallback)
            .with_sink(Sink::new("rotating", appender).with_formatter(text()));

        dispatcher.emit(&LogRecord::new("app", LogLevel::Info, "first record of the file"));
        dispatcher.emit(&LogRecord::new("app", LogLevel::Info, "second record of the file"));

        assert_eq!(dispatcher.metrics().delivered(), 2);
        let reports = reports.lock();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with("[LOGGER WARNING] Sink 'rotating' recovered"));
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_format_error_is_reported() {
        let (fallback, reports) = capture();
        let memory = MemoryAppender::new();
        let dispatcher = Dispatcher::new()
            .with_fallback(fallback)
            .with_sink(Sink::new("json", memory.clone()));

        let bad = LogRecord::new("app", LogLevel::Info, "{} and {}").with_args([1]);
        dispatcher.emit(&bad);

        assert!(memory.is_empty());
        assert_eq!(reports.lock().len(), 1);
    }

    #[test]
    fn test_emit_batch_preserves_order() {
        let memory = MemoryAppender::new();
        let dispatcher = Dispatcher::new().with_sink(Sink::new("m", memory.clone()).with_formatter(text()));

        let records: Vec<_> = ["R1", "R2", "R3"]
            .iter()
            .map(|m| LogRecord::new("app", LogLevel::Info, *m))
            .collect();
        dispatcher.emit_batch(&records);

        assert_eq!(memory.lines(), vec!["INFO R1", "INFO R2", "INFO R3"]);
    }

    #[test]
    fn test_empty_dispatcher() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.is_empty());
        dispatcher.emit(&LogRecord::new("app", LogLevel::Info, "nowhere"));
        assert!(dispatcher.flush().is_ok());
    }
}
