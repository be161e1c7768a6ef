//! Logging macros that capture the call site.
//!
//! The template is not formatted eagerly: positional arguments become record
//! `args` and are rendered by the sink's formatter, and `key => value` pairs
//! after a `;` become extra fields. Source file, line and module are filled
//! in from the macro invocation.
//!
//! # Examples
//!
//! ```
//! use rust_json_logger::prelude::*;
//! use rust_json_logger::info;
//!
//! let memory = MemoryAppender::new();
//! let logger = Logger::builder().sink(Sink::new("m", memory.clone())).build()?;
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With positional arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! // With extra fields
//! info!(logger, "Started application"; "note" => "some extra info here");
//!
//! assert_eq!(memory.len(), 3);
//! # Ok::<(), LoggerError>(())
//! ```

/// Log a record at an explicit level.
///
/// # Examples
///
/// ```
/// # use rust_json_logger::prelude::*;
/// # let logger = Logger::builder().build()?;
/// use rust_json_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// log!(logger, LogLevel::Warning, "Retry {} of {}", 1, 3; "host" => "db-1", "timeout_ms" => 250);
/// # Ok::<(), LoggerError>(())
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $template:expr $(, $arg:expr)* $(,)? $(; $($key:expr => $value:expr),+ $(,)?)?) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled_for(level) {
            logger
                .record(level, $template)
                .location(file!(), line!(), module_path!())
                $(.arg($arg))*
                $($(.extra($key, $value))+)?
                .emit();
        }
    }};
}

/// Log a debug-level record.
///
/// # Examples
///
/// ```
/// # use rust_json_logger::prelude::*;
/// # let logger = Logger::builder().build()?;
/// use rust_json_logger::debug;
/// debug!(logger, "Debug information");
/// debug!(logger, "Counter value: {}", 10);
/// # Ok::<(), LoggerError>(())
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level record.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level record.
///
/// # Examples
///
/// ```
/// # use rust_json_logger::prelude::*;
/// # let logger = Logger::builder().build()?;
/// use rust_json_logger::warning;
/// warning!(logger, "Low disk space");
/// warning!(logger, "Retry attempt {} of {}", 3, 5);
/// # Ok::<(), LoggerError>(())
/// ```
#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warning, $($arg)+)
    };
}

/// Log an error-level record.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a critical-level record.
///
/// # Examples
///
/// ```
/// # use rust_json_logger::prelude::*;
/// # let logger = Logger::builder().build()?;
/// use rust_json_logger::critical;
/// critical!(logger, "Unable to recover from error: {}", "disk full"; "component" => "storage");
/// # Ok::<(), LoggerError>(())
/// ```
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Critical, $($arg)+)
    };
}
