//! Log record structure

use super::error::{LoggerError, Result};
use super::field_value::{ExtraFields, FieldValue};
use super::log_level::LogLevel;
use super::timestamp::TimestampFormat;
use chrono::{DateTime, Utc};
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::path::Path;
use std::time::Instant;

/// Names the formatter always computes; extra fields may not use them.
pub const RESERVED_FIELDS: &[&str] = &["message", "timestamp", "exc_info", "stack_info"];

/// Attribute names resolvable through [`LogRecord::attribute`].
pub const BUILTIN_ATTRIBUTES: &[&str] = &[
    "name",
    "levelname",
    "levelno",
    "msg",
    "args",
    "created",
    "msecs",
    "pathname",
    "filename",
    "module",
    "lineno",
    "thread",
    "threadName",
    "process",
    "asctime",
];

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn current_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

fn current_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Check whether `key` collides with a built-in record attribute
pub fn is_reserved(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key) || BUILTIN_ATTRIBUTES.contains(&key)
}

/// Error details attached to a record
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
    pub causes: Vec<String>,
    pub trace: Option<String>,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            causes: Vec::new(),
            trace: None,
        }
    }

    /// Capture an error, its type name and its `source()` chain
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut info = Self::new(std::any::type_name::<E>(), err.to_string());
        let mut source = err.source();
        while let Some(cause) = source {
            info.causes.push(cause.to_string());
            source = cause.source();
        }
        info
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Render kind, message, causes and trace as one block of text
    pub fn format(&self) -> String {
        let mut out = format!("{}: {}", self.kind, self.message);
        for cause in &self.causes {
            out.push_str("\nCaused by: ");
            out.push_str(cause);
        }
        if let Some(trace) = &self.trace {
            let trace = trace.trim_end();
            if !trace.is_empty() {
                out.push('\n');
                out.push_str(trace);
            }
        }
        out
    }
}

/// One structured log event
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Name of the logger that produced the record
    pub name: String,
    pub level: LogLevel,
    /// Message template
    pub msg: String,
    pub args: Vec<FieldValue>,
    pub created: DateTime<Utc>,
    /// Monotonic creation instant, for ordering and latency measurements
    pub instant: Instant,
    pub exc_info: Option<ErrorInfo>,
    pub stack_info: Option<String>,
    pub extra: ExtraFields,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub module_path: Option<String>,
    pub thread_id: String,
    pub thread_name: Option<String>,
    pub process_id: u32,
}

impl LogRecord {
    pub fn new(name: impl Into<String>, level: LogLevel, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            msg: msg.into(),
            args: Vec::new(),
            created: Utc::now(),
            instant: Instant::now(),
            exc_info: None,
            stack_info: None,
            extra: ExtraFields::new(),
            file: None,
            line: None,
            module_path: None,
            thread_id: current_thread_id(),
            thread_name: current_thread_name(),
            process_id: std::process::id(),
        }
    }

    #[must_use]
    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Attach an extra field
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::ReservedField`] if `key` names a built-in
    /// attribute; the record is left unchanged.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Result<()> {
        let key = key.into();
        if is_reserved(&key) {
            return Err(LoggerError::ReservedField(key));
        }
        self.extra.insert(key, value);
        Ok(())
    }

    #[must_use]
    pub fn with_exc_info(mut self, info: ErrorInfo) -> Self {
        self.exc_info = Some(info);
        self
    }

    #[must_use]
    pub fn with_stack_info(mut self, stack: impl Into<String>) -> Self {
        self.stack_info = Some(stack.into());
        self
    }

    /// Capture the current call stack as `stack_info`
    #[must_use]
    pub fn with_captured_stack(self) -> Self {
        let stack = format!("Stack (most recent call first):\n{}", Backtrace::force_capture());
        self.with_stack_info(stack)
    }

    #[must_use]
    pub fn with_location(mut self, file: &str, line: u32, module_path: &str) -> Self {
        self.file = Some(file.to_string());
        self.line = Some(line);
        self.module_path = Some(module_path.to_string());
        self
    }

    /// Render the message template against `args` and extra fields
    ///
    /// A template without arguments is returned verbatim. Otherwise `{}`
    /// takes the next argument, `{N}` argument N, `{key}` an extra field,
    /// and `{{`/`}}` are literal braces. Surplus arguments are ignored.
    pub fn message(&self) -> Result<String> {
        if self.args.is_empty() {
            return Ok(self.msg.clone());
        }

        let mut next = 0;
        expand_placeholders(&self.msg, |key| {
            let value = if key.is_empty() {
                next += 1;
                self.args.get(next - 1)
            } else if let Ok(idx) = key.parse::<usize>() {
                self.args.get(idx)
            } else {
                self.extra.get(key)
            };
            value.map(ToString::to_string).ok_or_else(|| {
                LoggerError::formatter(
                    "message",
                    format!("no value for placeholder '{{{}}}' in {:?}", key, self.msg),
                )
            })
        })
    }

    /// Module name: the last `::` segment of the module path
    pub fn module(&self) -> Option<&str> {
        self.module_path
            .as_deref()
            .map(|path| path.rsplit("::").next().unwrap_or(path))
    }

    /// File name without directories
    pub fn filename(&self) -> Option<&str> {
        self.file
            .as_deref()
            .map(|file| Path::new(file).file_name().and_then(|n| n.to_str()).unwrap_or(file))
    }

    /// Look up a record attribute by name
    ///
    /// Built-in attributes are resolved first (absent location data is
    /// `null`), then extra fields. Returns `None` for unknown names.
    pub fn attribute(&self, name: &str) -> Option<serde_json::Value> {
        use serde_json::Value;

        let opt_str = |v: Option<&str>| v.map_or(Value::Null, |s| Value::String(s.to_string()));

        let value = match name {
            "name" => Value::String(self.name.clone()),
            "levelname" => Value::String(self.level.to_str().to_string()),
            "levelno" => Value::from(self.level.levelno()),
            "msg" => Value::String(self.msg.clone()),
            "args" => Value::Array(self.args.iter().map(FieldValue::to_json_value).collect()),
            "created" => {
                let secs = self.created.timestamp() as f64
                    + f64::from(self.created.timestamp_subsec_micros()) / 1_000_000.0;
                Value::from(secs)
            }
            "msecs" => Value::from(f64::from(self.created.timestamp_subsec_micros()) / 1000.0),
            "asctime" => Value::String(TimestampFormat::Iso8601.format(&self.created)),
            "pathname" => opt_str(self.file.as_deref()),
            "filename" => opt_str(self.filename()),
            "module" => opt_str(self.module()),
            "lineno" => self.line.map_or(Value::Null, Value::from),
            "thread" => Value::String(self.thread_id.clone()),
            "threadName" => opt_str(self.thread_name.as_deref()),
            "process" => Value::from(self.process_id),
            "message" => Value::String(self.message().ok()?),
            "exc_info" => self
                .exc_info
                .as_ref()
                .map_or(Value::Null, |info| Value::String(info.format())),
            "stack_info" => opt_str(self.stack_info.as_deref()),
            _ => return self.extra.get(name).map(FieldValue::to_json_value),
        };
        Some(value)
    }
}

/// Expand `{key}` placeholders in `template` through `resolve`
///
/// `{{` and `}}` produce literal braces. A lone `}` is kept as is.
pub(crate) fn expand_placeholders<F>(template: &str, mut resolve: F) -> Result<String>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => key.push(ch),
                        None => {
                            return Err(LoggerError::formatter(
                                "template",
                                format!("unclosed placeholder in {:?}", template),
                            ))
                        }
                    }
                }
                out.push_str(&resolve(key.trim())?);
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
