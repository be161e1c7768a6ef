//! Named producer handle over a direct dispatcher and async bridges

use super::{
    async_bridge::{AsyncBridge, QueueSettings, DEFAULT_SHUTDOWN_TIMEOUT},
    dispatcher::Dispatcher,
    error::{LoggerError, Result},
    fallback::{stderr_fallback, FallbackHandler},
    formatter::TextFormatter,
    log_level::LogLevel,
    metrics::PipelineMetrics,
    record::LogRecord,
    record_builder::RecordBuilder,
    sink::Sink,
};
use crate::appenders::ConsoleAppender;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Name used when the builder is not given one
pub const ROOT_LOGGER: &str = "root";

/// Producer handle
///
/// Cloning is cheap; clones and [`Logger::named`] children share the same
/// sinks, bridges and minimum level. The bridges stop once the last handle
/// is dropped, or earlier through [`Logger::shutdown`].
///
/// # Example
///
/// ```
/// use rust_json_logger::prelude::*;
///
/// let memory = MemoryAppender::new();
/// let logger = Logger::builder()
///     .name("app")
///     .min_level(LogLevel::Info)
///     .sink(Sink::new("memory", memory.clone()))
///     .build()?;
///
/// logger.debug("below the minimum level");
/// logger.info("Started application");
/// assert_eq!(memory.len(), 1);
/// # Ok::<(), LoggerError>(())
/// ```
#[derive(Clone)]
pub struct Logger {
    name: String,
    core: Arc<LoggerCore>,
}

struct LoggerCore {
    min_level: RwLock<LogLevel>,
    direct: Dispatcher,
    bridges: Vec<AsyncBridge>,
    metrics: Arc<PipelineMetrics>,
    fallback: FallbackHandler,
    shutdown_timeout: Duration,
}

impl Logger {
    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Logger whose only sink writes WARNING and above to stderr
    ///
    /// Used before any pipeline is configured so early problems are not
    /// lost.
    pub(crate) fn last_resort(name: impl Into<String>) -> Logger {
        let fallback = stderr_fallback();
        let metrics = Arc::new(PipelineMetrics::new());
        let direct = Dispatcher::new()
            .with_fallback(Arc::clone(&fallback))
            .with_metrics(Arc::clone(&metrics))
            .with_sink(
                Sink::new("last_resort", ConsoleAppender::stderr())
                    .with_level(LogLevel::Warning)
                    .with_formatter(TextFormatter::new("{levelname}:{name}:{message}")),
            );

        Logger {
            name: name.into(),
            core: Arc::new(LoggerCore {
                min_level: RwLock::new(LogLevel::Warning),
                direct,
                bridges: Vec::new(),
                metrics,
                fallback,
                shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle with another name over the same pipeline
    #[must_use]
    pub fn named(&self, name: impl Into<String>) -> Logger {
        Logger {
            name: name.into(),
            core: Arc::clone(&self.core),
        }
    }

    pub fn min_level(&self) -> LogLevel {
        *self.core.min_level.read()
    }

    /// Applies to every handle sharing this pipeline
    pub fn set_min_level(&self, level: LogLevel) {
        *self.core.min_level.write() = level;
    }

    #[inline]
    pub fn is_enabled_for(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    /// Start a record with arguments, extras or error details
    ///
    /// ```
    /// use rust_json_logger::prelude::*;
    ///
    /// let memory = MemoryAppender::new();
    /// let logger = Logger::builder().sink(Sink::new("m", memory.clone())).build()?;
    ///
    /// logger.record(LogLevel::Info, "{} items in {}ms")
    ///     .arg(3)
    ///     .arg(12.5)
    ///     .extra("request_id", "abc-123")
    ///     .emit();
    ///
    /// assert!(memory.lines()[0].contains("\"message\":\"3 items in 12.5ms\""));
    /// # Ok::<(), LoggerError>(())
    /// ```
    pub fn record(&self, level: LogLevel, template: impl Into<String>) -> RecordBuilder<'_> {
        if self.is_enabled_for(level) {
            RecordBuilder::new(self, LogRecord::new(self.name.clone(), level, template))
        } else {
            RecordBuilder::disabled(self)
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if self.is_enabled_for(level) {
            self.emit(LogRecord::new(self.name.clone(), level, message));
        }
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn critical(&self, message: impl Into<String>) {
        self.log(LogLevel::Critical, message);
    }

    /// Route a finished record to the direct sinks and every bridge
    ///
    /// Records below the minimum level are discarded. Nothing is returned to
    /// the caller: queue rejections go to the fallback channel.
    pub fn emit(&self, record: LogRecord) {
        if !self.is_enabled_for(record.level) {
            return;
        }

        let core = &self.core;
        if !core.direct.is_empty() {
            core.direct.emit(&record);
        }

        if let Some((last, rest)) = core.bridges.split_last() {
            for bridge in rest {
                self.put(bridge, record.clone());
            }
            self.put(last, record);
        }
    }

    fn put(&self, bridge: &AsyncBridge, record: LogRecord) {
        if let Err(e) = bridge.put(record) {
            // Alert on the first rejection and periodically thereafter
            let rejected = self.core.metrics.rejected();
            if rejected <= 1 || rejected % 1000 == 0 {
                self.report(&format!(
                    "[LOGGER WARNING] Queue '{}' rejected a record ({} so far): {}",
                    bridge.name(),
                    rejected,
                    e
                ));
            }
        }
    }

    pub(crate) fn report(&self, message: &str) {
        (self.core.fallback)(message);
    }

    /// Flush the direct sinks
    ///
    /// Bridged sinks are flushed by their listener after every batch.
    pub fn flush(&self) -> Result<()> {
        self.core.direct.flush()
    }

    /// Get the pipeline metrics for observability
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.core.metrics
    }

    pub fn bridges(&self) -> &[AsyncBridge] {
        &self.core.bridges
    }

    /// Stop every bridge, draining queued records, then flush direct sinks
    ///
    /// All bridges are stopped even if one times out; the first error is
    /// returned after each one has been reported. Calling it again is a
    /// no-op for bridges that already stopped.
    ///
    /// ```no_run
    /// use rust_json_logger::{Logger, DEFAULT_SHUTDOWN_TIMEOUT};
    ///
    /// let logger = Logger::builder().build()?;
    /// logger.info("Important message");
    ///
    /// if let Err(e) = logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT) {
    ///     eprintln!("Warning: {}", e);
    /// }
    /// # Ok::<(), rust_json_logger::LoggerError>(())
    /// ```
    pub fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.core.shutdown(timeout)
    }
}

impl LoggerCore {
    fn shutdown(&self, timeout: Duration) -> Result<()> {
        let mut first_error = None;
        for bridge in &self.bridges {
            if let Err(e) = bridge.stop(timeout) {
                (self.fallback)(&format!("[LOGGER WARNING] {}. Some logs may be lost.", e));
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.direct.flush() {
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for LoggerCore {
    fn drop(&mut self) {
        let _ = self.shutdown(self.shutdown_timeout);

        let rejected = self.metrics.rejected();
        if rejected > 0 {
            (self.fallback)(&format!(
                "[LOGGER WARNING] Logger shutting down with {} rejected records",
                rejected
            ));
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("min_level", &self.min_level())
            .field("direct", &self.core.direct)
            .field("bridges", &self.core.bridges)
            .finish()
    }
}

/// Builder for constructing Logger with a fluent API
///
/// Sinks added with [`LoggerBuilder::sink`] are written on the producer's
/// thread; sinks grouped by [`LoggerBuilder::queue`] sit behind an
/// [`AsyncBridge`] whose listener starts in [`LoggerBuilder::build`].
///
/// # Example
/// ```
/// use rust_json_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .name("service")
///     .min_level(LogLevel::Debug)
///     .sink(Sink::new("stdout", ConsoleAppender::stdout()).with_filter(NonErrorFilter))
///     .queue(
///         QueueSettings::new("errors").bounded(1000),
///         [Sink::new("stderr", ConsoleAppender::stderr()).with_level(LogLevel::Warning)],
///     )
///     .build()?;
///
/// logger.warning("An example warning message");
/// logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT)?;
/// # Ok::<(), LoggerError>(())
/// ```
pub struct LoggerBuilder {
    name: String,
    min_level: LogLevel,
    sinks: Vec<Sink>,
    queues: Vec<(QueueSettings, Vec<Sink>)>,
    fallback: Option<FallbackHandler>,
    shutdown_timeout: Duration,
}

impl LoggerBuilder {
    /// Root name, DEBUG minimum level, stderr fallback
    pub fn new() -> Self {
        Self {
            name: ROOT_LOGGER.to_string(),
            min_level: LogLevel::Debug,
            sinks: Vec::new(),
            queues: Vec::new(),
            fallback: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set minimum log level
    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Add a sink written directly by producers
    #[must_use = "builder methods return a new value"]
    pub fn sink(mut self, sink: Sink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Add a bridge that feeds the given sinks from its own listener thread
    #[must_use = "builder methods return a new value"]
    pub fn queue(mut self, settings: QueueSettings, sinks: impl IntoIterator<Item = Sink>) -> Self {
        self.queues.push((settings, sinks.into_iter().collect()));
        self
    }

    /// Where the pipeline reports its own failures (default: stderr)
    #[must_use = "builder methods return a new value"]
    pub fn fallback(mut self, handler: FallbackHandler) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Timeout applied when the last handle is dropped
    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Build the Logger and start every bridge listener
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for a bounded queue of capacity zero,
    /// `SpawnError` if a listener thread cannot be started.
    pub fn build(self) -> Result<Logger> {
        let fallback = self.fallback.unwrap_or_else(stderr_fallback);
        let metrics = Arc::new(PipelineMetrics::new());
        let dispatcher = || {
            Dispatcher::new()
                .with_fallback(Arc::clone(&fallback))
                .with_metrics(Arc::clone(&metrics))
        };

        let mut direct = dispatcher();
        for sink in self.sinks {
            direct.add_sink(sink);
        }

        let mut bridges = Vec::with_capacity(self.queues.len());
        for (settings, sinks) in self.queues {
            if settings.capacity == Some(0) {
                return Err(LoggerError::config(
                    format!("queue '{}'", settings.name),
                    "capacity must be at least 1",
                ));
            }
            let mut bridged = dispatcher();
            for sink in sinks {
                bridged.add_sink(sink);
            }
            let bridge = AsyncBridge::new(bridged, settings);
            bridge.start()?;
            bridges.push(bridge);
        }

        Ok(Logger {
            name: self.name,
            core: Arc::new(LoggerCore {
                min_level: RwLock::new(self.min_level),
                direct,
                bridges,
                metrics,
                fallback,
                shutdown_timeout: self.shutdown_timeout,
            }),
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::MemoryAppender;
    use crate::core::filter::NonErrorFilter;
    use crate::core::overflow_policy::OverflowPolicy;
    use parking_lot::Mutex;

    fn text_sink(name: &str, memory: &MemoryAppender) -> Sink {
        Sink::new(name, memory.clone()).with_formatter(TextFormatter::new("{name} {levelname} {message}"))
    }

    fn capture() -> (FallbackHandler, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let handler: FallbackHandler = Arc::new(move |msg: &str| sink.lock().push(msg.to_string()));
        (handler, lines)
    }

    #[test]
    fn test_level_gate() {
        let memory = MemoryAppender::new();
        let logger = Logger::builder()
            .min_level(LogLevel::Warning)
            .sink(text_sink("m", &memory))
            .build()
            .unwrap();

        logger.info("dropped");
        logger.warning("kept");
        assert_eq!(memory.lines(), vec!["root WARNING kept"]);

        logger.set_min_level(LogLevel::Debug);
        logger.debug("now kept");
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_named_children_share_pipeline() {
        let memory = MemoryAppender::new();
        let root = Logger::builder().sink(text_sink("m", &memory)).build().unwrap();
        let child = root.named("app.db");

        child.info("connected");
        root.set_min_level(LogLevel::Error);
        child.info("suppressed");

        assert_eq!(memory.lines(), vec!["app.db INFO connected"]);
        assert_eq!(child.name(), "app.db");
    }

    #[test]
    fn test_direct_and_queued_sinks() {
        let direct = MemoryAppender::new();
        let queued = MemoryAppender::new();
        let logger = Logger::builder()
            .sink(text_sink("direct", &direct).with_filter(NonErrorFilter))
            .queue(
                QueueSettings::new("q"),
                [text_sink("queued", &queued).with_level(LogLevel::Warning)],
            )
            .build()
            .unwrap();

        logger.info("Started application");
        logger.warning("An example warning message");
        logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).unwrap();

        assert_eq!(direct.lines(), vec!["root INFO Started application"]);
        assert_eq!(queued.lines(), vec!["root WARNING An example warning message"]);
    }

    #[test]
    fn test_record_reaches_every_bridge() {
        let first = MemoryAppender::new();
        let second = MemoryAppender::new();
        let logger = Logger::builder()
            .queue(QueueSettings::new("a"), [text_sink("a", &first)])
            .queue(QueueSettings::new("b"), [text_sink("b", &second)])
            .build()
            .unwrap();

        logger.error("fan out");
        logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(logger.metrics().queued(), 2);
    }

    #[test]
    fn test_rejected_after_shutdown_is_reported() {
        let (fallback, reports) = capture();
        let memory = MemoryAppender::new();
        let logger = Logger::builder()
            .fallback(fallback)
            .queue(QueueSettings::new("q"), [text_sink("m", &memory)])
            .build()
            .unwrap();

        logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).unwrap();
        logger.info("too late");

        assert!(memory.is_empty());
        assert_eq!(logger.metrics().rejected(), 1);
        assert!(reports.lock()[0].contains("Queue 'q' rejected"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = Logger::builder()
            .queue(
                QueueSettings::new("empty").bounded(0).with_policy(OverflowPolicy::FailFast),
                Vec::<Sink>::new(),
            )
            .build();
        assert!(matches!(result, Err(LoggerError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_drop_drains_bridges() {
        let memory = MemoryAppender::new();
        {
            let logger = Logger::builder()
                .queue(QueueSettings::new("q").bounded(8), [text_sink("m", &memory)])
                .build()
                .unwrap();
            for i in 0..50 {
                logger.info(format!("record {}", i));
            }
        }
        assert_eq!(memory.len(), 50);
    }
}
