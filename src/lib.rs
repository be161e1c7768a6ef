//! # Rust JSON Logger
//!
//! Structured logging with JSON output, severity routing and an
//! asynchronous queue in front of slow sinks.
//!
//! ## Features
//!
//! - **JSON Records**: one object per line, configurable key mapping, extra
//!   fields merged at the top level
//! - **Severity Routing**: per-sink thresholds and filters such as
//!   [`NonErrorFilter`] to split informational and error streams
//! - **Async Bridge**: queue plus listener thread with drain-on-stop
//! - **Configurable**: build the whole pipeline from a serde
//!   [`LoggingConfig`](config::LoggingConfig)
//!
//! ## Example
//!
//! ```
//! use rust_json_logger::prelude::*;
//!
//! let memory = MemoryAppender::new();
//! let logger = Logger::builder()
//!     .name("app")
//!     .sink(Sink::new("json", memory.clone()).with_formatter(JsonFormatter::new(
//!         FieldMapping::new()
//!             .field("level", "levelname")
//!             .field("message", "message")
//!             .field("timestamp", "timestamp"),
//!     )))
//!     .build()?;
//!
//! logger.record(LogLevel::Info, "Started application")
//!     .extra("note", "some extra info here")
//!     .emit();
//!
//! let line = &memory.lines()[0];
//! assert!(line.starts_with(r#"{"level":"INFO","message":"Started application","timestamp":"#));
//! assert!(line.ends_with(r#""note":"some extra info here"}"#));
//! # Ok::<(), LoggerError>(())
//! ```

pub mod appenders;
pub mod config;
pub mod core;
pub mod macros;
pub mod pipeline;

pub mod prelude {
    pub use crate::appenders::{
        ConsoleAppender, FileAppender, MemoryAppender, RotatingFileAppender, RotationPolicy,
    };
    pub use crate::config::LoggingConfig;
    pub use crate::core::{
        Appender, AsyncBridge, Dispatcher, ErrorInfo, ExtraFields, FieldMapping, FieldValue,
        Filter, Formatter, JsonFormatter, LevelRangeFilter, LogLevel, LogRecord, Logger,
        LoggerBuilder, LoggerError, NameFilter, NonErrorFilter, OverflowPolicy, PipelineMetrics,
        QueueSettings, Result, Sink, TextFormatter, TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::pipeline::{get_logger, setup, LoggingPipeline};
}

pub use appenders::{ConsoleAppender, FileAppender, MemoryAppender, RotatingFileAppender};
pub use core::{
    Appender, AsyncBridge, BridgeState, Dispatcher, ErrorInfo, ExtraFields, FallbackHandler,
    FieldMapping, FieldValue, Filter, Formatter, JsonFormatter, LevelRangeFilter, LogLevel,
    LogRecord, Logger, LoggerBuilder, LoggerError, NameFilter, NonErrorFilter, OverflowPolicy,
    PipelineMetrics, QueueSettings, RecordBuilder, Result, Sink, TextFormatter, TimestampFormat,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use pipeline::{get_logger, setup, shutdown, GlobalGuard, LoggingPipeline};
