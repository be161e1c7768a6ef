//! Declarative pipeline configuration
//!
//! A [`LoggingConfig`] names formatters and filters, lists sinks that refer
//! to them, and groups sinks behind queues. It is plain serde data: the
//! caller parses it from wherever it lives and hands it to
//! [`LoggingPipeline::from_config`](crate::pipeline::LoggingPipeline::from_config).
//!
//! ```
//! use rust_json_logger::config::LoggingConfig;
//!
//! let config = LoggingConfig::from_json_str(r#"{
//!     "level": "INFO",
//!     "formatters": {
//!         "json": { "type": "json", "fmt_keys": { "level": "levelname", "message": "message" } }
//!     },
//!     "filters": { "no_errors": { "type": "non_error" } },
//!     "sinks": [
//!         { "name": "stdout", "medium": { "type": "stdout" }, "formatter": "json", "filters": ["no_errors"] },
//!         { "name": "stderr", "medium": { "type": "stderr" }, "formatter": "json", "level": "WARNING" }
//!     ],
//!     "queues": [ { "name": "main", "sinks": ["stdout", "stderr"], "capacity": 1000 } ]
//! }"#)?;
//!
//! assert_eq!(config.sinks.len(), 2);
//! # Ok::<(), rust_json_logger::LoggerError>(())
//! ```

use crate::appenders::{
    Appender, ConsoleAppender, FileAppender, RotatingFileAppender, RotationPolicy, RotationStrategy,
};
use crate::core::{
    FieldMapping, Filter, Formatter, JsonFormatter, LevelRangeFilter, LogLevel, LoggerError,
    NameFilter, NonErrorFilter, OverflowPolicy, QueueSettings, Result, TextFormatter,
    TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default size limit for rotating file sinks (10 MB)
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Default number of rotated backups kept
pub const DEFAULT_BACKUP_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Minimum level of the root logger
    #[serde(default = "default_level")]
    pub level: LogLevel,

    #[serde(default)]
    pub formatters: BTreeMap<String, FormatterConfig>,

    #[serde(default)]
    pub filters: BTreeMap<String, FilterConfig>,

    /// Sinks in dispatch order
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,

    #[serde(default)]
    pub queues: Vec<QueueConfig>,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormatterConfig {
    Json {
        #[serde(default)]
        fmt_keys: FieldMapping,
        #[serde(default)]
        indent: Option<usize>,
    },
    Text {
        #[serde(default = "default_text_format")]
        format: String,
        /// strftime pattern for `asctime`
        #[serde(default)]
        datefmt: Option<String>,
        #[serde(default)]
        colors: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    NonError,
    LevelRange { min: LogLevel, max: LogLevel },
    Name { prefix: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediumConfig {
    Stdout,
    Stderr,
    File {
        path: PathBuf,
    },
    RotatingFile {
        path: PathBuf,
        #[serde(default = "default_max_bytes")]
        max_bytes: u64,
        #[serde(default = "default_backup_count")]
        backup_count: usize,
        #[serde(default)]
        compress: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SinkConfig {
    pub name: String,
    pub medium: MediumConfig,
    /// Formatter name; the default JSON formatter when absent
    #[serde(default)]
    pub formatter: Option<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default = "default_level")]
    pub level: LogLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    pub name: String,
    /// Names of the sinks this queue feeds
    pub sinks: Vec<String>,
    /// `None` for an unbounded queue
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub on_full: OverflowPolicy,
}

fn default_level() -> LogLevel {
    LogLevel::Debug
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64
}

fn default_text_format() -> String {
    TextFormatter::DEFAULT_TEMPLATE.to_string()
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

fn default_backup_count() -> usize {
    DEFAULT_BACKUP_COUNT
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            formatters: BTreeMap::new(),
            filters: BTreeMap::new(),
            sinks: Vec::new(),
            queues: Vec::new(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl LoggingConfig {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(format!("reading config {}", path.display()), e.to_string(), e)
        })?;
        Self::from_json_str(&content)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Check every cross-reference and structural rule
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` naming the offending component for: duplicate
    /// sink or queue names, unknown formatter/filter/sink references, a sink
    /// fed by two queues, a queue without sinks or with capacity zero, an
    /// inverted level range and a `datefmt` chrono cannot render.
    pub fn validate(&self) -> Result<()> {
        for (name, formatter) in &self.formatters {
            if let FormatterConfig::Text {
                datefmt: Some(pattern),
                ..
            } = formatter
            {
                if !TimestampFormat::is_valid_pattern(pattern) {
                    return Err(LoggerError::config(
                        format!("formatter '{}'", name),
                        format!("invalid datefmt '{}'", pattern),
                    ));
                }
            }
        }

        for (name, filter) in &self.filters {
            if let FilterConfig::LevelRange { min, max } = filter {
                if min > max {
                    return Err(LoggerError::config(
                        format!("filter '{}'", name),
                        format!("min {} is above max {}", min, max),
                    ));
                }
            }
        }

        let mut sink_names = HashSet::new();
        for sink in &self.sinks {
            let component = format!("sink '{}'", sink.name);
            if !sink_names.insert(sink.name.as_str()) {
                return Err(LoggerError::config(component, "duplicate sink name"));
            }
            if let Some(formatter) = &sink.formatter {
                if !self.formatters.contains_key(formatter) {
                    return Err(LoggerError::config(
                        component,
                        format!("unknown formatter '{}'", formatter),
                    ));
                }
            }
            if let Some(filter) = sink.filters.iter().find(|f| !self.filters.contains_key(*f)) {
                return Err(LoggerError::config(component, format!("unknown filter '{}'", filter)));
            }
        }

        let mut queue_names = HashSet::new();
        let mut owner: HashMap<&str, &str> = HashMap::new();
        for queue in &self.queues {
            let component = format!("queue '{}'", queue.name);
            if !queue_names.insert(queue.name.as_str()) {
                return Err(LoggerError::config(component, "duplicate queue name"));
            }
            if queue.capacity == Some(0) {
                return Err(LoggerError::config(component, "capacity must be at least 1"));
            }
            if queue.sinks.is_empty() {
                return Err(LoggerError::config(component, "no sinks to feed"));
            }
            for sink in &queue.sinks {
                if !sink_names.contains(sink.as_str()) {
                    return Err(LoggerError::config(component, format!("unknown sink '{}'", sink)));
                }
                if let Some(previous) = owner.insert(sink.as_str(), queue.name.as_str()) {
                    return Err(LoggerError::config(
                        component,
                        format!("sink '{}' is already fed by queue '{}'", sink, previous),
                    ));
                }
            }
        }

        Ok(())
    }
}

impl FormatterConfig {
    pub fn build(&self) -> Formatter {
        match self {
            FormatterConfig::Json { fmt_keys, indent } => {
                JsonFormatter::new(fmt_keys.clone()).with_indent(*indent).into()
            }
            FormatterConfig::Text {
                format,
                datefmt,
                colors,
            } => TextFormatter::new(format.clone())
                .with_datefmt(TimestampFormat::from_datefmt(datefmt.as_deref()))
                .with_colors(*colors)
                .into(),
        }
    }
}

impl FilterConfig {
    pub fn build(&self) -> Arc<dyn Filter> {
        match self {
            FilterConfig::NonError => Arc::new(NonErrorFilter),
            FilterConfig::LevelRange { min, max } => Arc::new(LevelRangeFilter::new(*min, *max)),
            FilterConfig::Name { prefix } => Arc::new(NameFilter::new(prefix.clone())),
        }
    }
}

impl MediumConfig {
    /// Open the medium; files and their parent directories are created
    pub fn open(&self) -> Result<Box<dyn Appender>> {
        Ok(match self {
            MediumConfig::Stdout => Box::new(ConsoleAppender::stdout()),
            MediumConfig::Stderr => Box::new(ConsoleAppender::stderr()),
            MediumConfig::File { path } => Box::new(FileAppender::new(path.clone())?),
            MediumConfig::RotatingFile {
                path,
                max_bytes,
                backup_count,
                compress,
            } => {
                let policy = RotationPolicy::new()
                    .with_strategy(RotationStrategy::size(*max_bytes))
                    .with_max_backups(*backup_count)
                    .with_compression(*compress);
                Box::new(RotatingFileAppender::with_policy(path, policy)?)
            }
        })
    }
}

impl QueueConfig {
    pub fn settings(&self) -> QueueSettings {
        QueueSettings {
            name: self.name.clone(),
            capacity: self.capacity,
            policy: self.on_full,
        }
    }
}
