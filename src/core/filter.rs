//! Record filters attached to sinks

use super::log_level::LogLevel;
use super::record::LogRecord;

/// Predicate over a record; a sink writes a record only if every one of
/// its filters accepts it.
pub trait Filter: Send + Sync {
    fn accepts(&self, record: &LogRecord) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&LogRecord) -> bool + Send + Sync,
{
    fn accepts(&self, record: &LogRecord) -> bool {
        self(record)
    }
}

/// Admits DEBUG and INFO, rejects WARNING and above
///
/// Pairs an informational stream with an error stream that has a WARNING
/// threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonErrorFilter;

impl Filter for NonErrorFilter {
    #[inline]
    fn accepts(&self, record: &LogRecord) -> bool {
        record.level <= LogLevel::Info
    }
}

/// Admits levels within `min..=max`
#[derive(Debug, Clone, Copy)]
pub struct LevelRangeFilter {
    pub min: LogLevel,
    pub max: LogLevel,
}

impl LevelRangeFilter {
    pub fn new(min: LogLevel, max: LogLevel) -> Self {
        Self { min, max }
    }
}

impl Filter for LevelRangeFilter {
    fn accepts(&self, record: &LogRecord) -> bool {
        (self.min..=self.max).contains(&record.level)
    }
}

/// Admits records from the named logger and its dotted descendants
///
/// `NameFilter::new("app.db")` accepts `app.db` and `app.db.pool` but not
/// `app.dbx`. An empty prefix accepts everything.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    prefix: String,
}

impl NameFilter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Filter for NameFilter {
    fn accepts(&self, record: &LogRecord) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        match record.name.strip_prefix(&self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: LogLevel) -> LogRecord {
        LogRecord::new("app", level, "msg")
    }

    #[test]
    fn test_non_error_filter() {
        let filter = NonErrorFilter;
        assert!(filter.accepts(&record(LogLevel::Debug)));
        assert!(filter.accepts(&record(LogLevel::Info)));
        assert!(!filter.accepts(&record(LogLevel::Warning)));
        assert!(!filter.accepts(&record(LogLevel::Error)));
        assert!(!filter.accepts(&record(LogLevel::Critical)));
    }

    #[test]
    fn test_level_range_filter() {
        let filter = LevelRangeFilter::new(LogLevel::Info, LogLevel::Warning);
        assert!(!filter.accepts(&record(LogLevel::Debug)));
        assert!(filter.accepts(&record(LogLevel::Info)));
        assert!(filter.accepts(&record(LogLevel::Warning)));
        assert!(!filter.accepts(&record(LogLevel::Error)));
    }

    #[test]
    fn test_name_filter() {
        let filter = NameFilter::new("app.db");
        assert!(filter.accepts(&LogRecord::new("app.db", LogLevel::Info, "x")));
        assert!(filter.accepts(&LogRecord::new("app.db.pool", LogLevel::Info, "x")));
        assert!(!filter.accepts(&LogRecord::new("app.dbx", LogLevel::Info, "x")));
        assert!(!filter.accepts(&LogRecord::new("app", LogLevel::Info, "x")));
        assert!(NameFilter::default().accepts(&LogRecord::new("any", LogLevel::Info, "x")));
    }

    #[test]
    fn test_closure_filter() {
        let only_app = |r: &LogRecord| r.name == "app";
        assert!(only_app.accepts(&record(LogLevel::Info)));
    }
}
