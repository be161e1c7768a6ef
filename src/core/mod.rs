//! Core logger types and traits

pub mod appender;
pub mod async_bridge;
pub mod dispatcher;
pub mod error;
pub mod fallback;
pub mod field_value;
pub mod filter;
pub mod formatter;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod record;
pub mod record_builder;
pub mod sink;
pub mod timestamp;

pub use appender::Appender;
pub use async_bridge::{AsyncBridge, BridgeState, QueueSettings, DEFAULT_SHUTDOWN_TIMEOUT};
pub use dispatcher::Dispatcher;
pub use error::{LoggerError, Result};
pub use fallback::{stderr_fallback, FallbackHandler};
pub use field_value::{ExtraFields, FieldValue};
pub use filter::{Filter, LevelRangeFilter, NameFilter, NonErrorFilter};
pub use formatter::{FieldMapping, Formatter, JsonFormatter, TextFormatter};
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder, ROOT_LOGGER};
pub use metrics::PipelineMetrics;
pub use overflow_policy::OverflowPolicy;
pub use record::{ErrorInfo, LogRecord, RESERVED_FIELDS};
pub use record_builder::RecordBuilder;
pub use sink::Sink;
pub use timestamp::TimestampFormat;
