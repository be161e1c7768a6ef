//! Error types for the logging pipeline

use std::time::Duration;

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Malformed configuration or dangling reference at setup time
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// A record could not be rendered by a formatter
    #[error("Formatter error ({format_type}): {message}")]
    FormatterError {
        format_type: String,
        message: String,
    },

    /// A field mapping or template referenced an attribute the record lacks
    #[error("Record has no attribute '{0}'")]
    MissingAttribute(String),

    /// An extra field tried to shadow a built-in record attribute
    #[error("Extra field '{0}' would overwrite a built-in record attribute")]
    ReservedField(String),

    /// Sink medium rejected a write
    #[error("Sink '{sink}' write failed: {message}")]
    SinkWrite { sink: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Bounded queue full under a non-blocking policy
    #[error("Log queue full: {current}/{max} records buffered")]
    QueueFull { current: usize, max: usize },

    /// Bridge no longer accepts records
    #[error("Logger already stopped")]
    LoggerStopped,

    /// Listener thread was already started
    #[error("Listener for '{0}' already started")]
    AlreadyStarted(String),

    /// Listener thread did not exit in time
    #[error("Listener for '{bridge}' did not stop within {timeout:?}")]
    ShutdownTimeout { bridge: String, timeout: Duration },

    /// Listener thread could not be spawned
    #[error("Failed to spawn listener thread: {0}")]
    SpawnError(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a formatter error
    pub fn formatter(format_type: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FormatterError {
            format_type: format_type.into(),
            message: message.into(),
        }
    }

    /// Create a sink write error
    pub fn sink_write(sink: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::SinkWrite {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn queue_full(current: usize, max: usize) -> Self {
        LoggerError::QueueFull { current, max }
    }

    pub fn shutdown_timeout(bridge: impl Into<String>, timeout: Duration) -> Self {
        LoggerError::ShutdownTimeout {
            bridge: bridge.into(),
            timeout,
        }
    }

    /// True for errors that concern a single record rather than the pipeline
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            LoggerError::FormatterError { .. }
                | LoggerError::MissingAttribute(_)
                | LoggerError::JsonError(_)
        )
    }
}
