//! Record formatters
//!
//! - `JsonFormatter`: one JSON object per record, keys ordered by a
//!   caller-supplied [`FieldMapping`], extra fields merged at top level
//! - `TextFormatter`: human-readable line built from a `{attribute}` template

use super::error::{LoggerError, Result};
use super::record::{expand_placeholders, LogRecord};
use super::timestamp::TimestampFormat;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Ordered `output key -> record attribute` table
///
/// Deserializes from a JSON object and keeps the object's key order.
///
/// ```
/// use rust_json_logger::FieldMapping;
///
/// let mapping = FieldMapping::new()
///     .field("level", "levelname")
///     .field("message", "message")
///     .field("timestamp", "timestamp");
/// assert_eq!(mapping.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(String, String)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, output_key: impl Into<String>, source: impl Into<String>) -> Self {
        self.entries.push((output_key.into(), source.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl Serialize for FieldMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = FieldMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of output keys to record attribute names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<FieldMapping, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, source)) = access.next_entry::<String, String>()? {
                    entries.push((key, source));
                }
                Ok(FieldMapping { entries })
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

/// Key/value pairs serialized as a JSON object in insertion order
struct OrderedObject(Vec<(String, Value)>);

impl OrderedObject {
    /// Insert, or overwrite in place if the key was already emitted
    fn insert(&mut self, key: String, value: Value) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }
}

impl Serialize for OrderedObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// JSON formatter
///
/// Always emits `message` and `timestamp` (ISO 8601, `+00:00` offset,
/// microseconds), plus `exc_info`/`stack_info` when the record carries
/// them. Mapped keys come first in mapping order, then unmapped implicit
/// fields, then extra fields.
///
/// # Example
///
/// ```
/// use rust_json_logger::{FieldMapping, JsonFormatter, LogLevel, LogRecord};
///
/// let formatter = JsonFormatter::new(FieldMapping::new().field("level", "levelname"));
/// let mut record = LogRecord::new("app", LogLevel::Info, "Started application");
/// record.insert_extra("note", "some extra info here").unwrap();
///
/// let line = formatter.format(&record).unwrap();
/// assert!(line.starts_with(r#"{"level":"INFO","message":"Started application","timestamp":"#));
/// assert!(line.ends_with(r#""note":"some extra info here"}"#));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonFormatter {
    mapping: FieldMapping,
    indent: Option<usize>,
}

impl JsonFormatter {
    pub fn new(mapping: FieldMapping) -> Self {
        Self {
            mapping,
            indent: None,
        }
    }

    /// Pretty-print with `width` spaces per level; `None` is compact
    #[must_use]
    pub fn with_indent(mut self, width: Option<usize>) -> Self {
        self.indent = width;
        self
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn format(&self, record: &LogRecord) -> Result<String> {
        let object = self.prepare(record)?;

        match self.indent {
            None => Ok(serde_json::to_string(&object)?),
            Some(width) => {
                let indent = vec![b' '; width];
                let mut buf = Vec::with_capacity(256);
                let pretty = serde_json::ser::PrettyFormatter::with_indent(&indent);
                let mut serializer = serde_json::Serializer::with_formatter(&mut buf, pretty);
                object.serialize(&mut serializer)?;
                String::from_utf8(buf)
                    .map_err(|e| LoggerError::formatter("json", e.to_string()))
            }
        }
    }

    fn prepare(&self, record: &LogRecord) -> Result<OrderedObject> {
        let mut implicit: Vec<(&'static str, Value)> = vec![
            ("message", Value::String(record.message()?)),
            (
                "timestamp",
                Value::String(TimestampFormat::Iso8601Offset.format(&record.created)),
            ),
        ];
        if let Some(info) = &record.exc_info {
            implicit.push(("exc_info", Value::String(info.format())));
        }
        if let Some(stack) = &record.stack_info {
            implicit.push(("stack_info", Value::String(stack.clone())));
        }

        let mut object = OrderedObject(Vec::with_capacity(
            self.mapping.len() + implicit.len() + record.extra.len(),
        ));

        for (output_key, source) in self.mapping.iter() {
            let value = match implicit.iter().position(|(name, _)| *name == source) {
                Some(idx) => implicit.remove(idx).1,
                None => record
                    .attribute(source)
                    .ok_or_else(|| LoggerError::MissingAttribute(source.to_string()))?,
            };
            object.insert(output_key.to_string(), value);
        }

        for (name, value) in implicit {
            object.insert(name.to_string(), value);
        }

        for (key, value) in record.extra.iter() {
            object.insert(key.to_string(), value.to_json_value());
        }

        Ok(object)
    }
}

/// Text formatter
///
/// Placeholders are record attribute names plus `message` and `asctime`
/// (rendered with the configured [`TimestampFormat`]).
#[derive(Debug, Clone, PartialEq)]
pub struct TextFormatter {
    template: String,
    datefmt: TimestampFormat,
    colors: bool,
}

impl TextFormatter {
    pub const DEFAULT_TEMPLATE: &'static str = "{message}";

    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            datefmt: TimestampFormat::default(),
            colors: false,
        }
    }

    #[must_use]
    pub fn with_datefmt(mut self, format: TimestampFormat) -> Self {
        self.datefmt = format;
        self
    }

    /// Colour the level name with ANSI codes
    #[must_use]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    pub fn format(&self, record: &LogRecord) -> Result<String> {
        let mut line = expand_placeholders(&self.template, |key| match key {
            "message" => record.message(),
            "asctime" => Ok(self.datefmt.format(&record.created)),
            "levelname" => Ok(self.level_name(record)),
            _ => match record.attribute(key) {
                Some(Value::String(s)) => Ok(s),
                Some(Value::Null) => Ok(String::new()),
                Some(other) => Ok(other.to_string()),
                None => Err(LoggerError::MissingAttribute(key.to_string())),
            },
        })?;

        if let Some(info) = &record.exc_info {
            line.push('\n');
            line.push_str(&info.format());
        }
        if let Some(stack) = &record.stack_info {
            line.push('\n');
            line.push_str(stack);
        }
        Ok(line)
    }

    #[cfg(feature = "console")]
    fn level_name(&self, record: &LogRecord) -> String {
        use colored::Colorize;
        if self.colors {
            record.level.to_str().color(record.level.color_code()).to_string()
        } else {
            record.level.to_str().to_string()
        }
    }

    #[cfg(not(feature = "console"))]
    fn level_name(&self, record: &LogRecord) -> String {
        record.level.to_str().to_string()
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TEMPLATE)
    }
}

/// Formatter attached to a sink
#[derive(Debug, Clone, PartialEq)]
pub enum Formatter {
    Json(JsonFormatter),
    Text(TextFormatter),
}

impl Formatter {
    pub fn format(&self, record: &LogRecord) -> Result<String> {
        match self {
            Formatter::Json(json) => json.format(record),
            Formatter::Text(text) => text.format(record),
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::Json(JsonFormatter::default())
    }
}

impl From<JsonFormatter> for Formatter {
    fn from(f: JsonFormatter) -> Self {
        Formatter::Json(f)
    }
}

impl From<TextFormatter> for Formatter {
    fn from(f: TextFormatter) -> Self {
        Formatter::Text(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field_value::FieldValue;
    use crate::core::log_level::LogLevel;
    use crate::core::record::ErrorInfo;

    fn standard_mapping() -> FieldMapping {
        FieldMapping::new()
            .field("level", "levelname")
            .field("message", "message")
            .field("timestamp", "timestamp")
    }

    fn keys(line: &str) -> Vec<String> {
        // serde_json::Map sorts keys, so walk the text to recover order
        let mut de = serde_json::Deserializer::from_str(line);
        let ordered: OrderedKeys = Deserialize::deserialize(&mut de).unwrap();
        ordered.0
    }

    struct OrderedKeys(Vec<String>);

    impl<'de> Deserialize<'de> for OrderedKeys {
        fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
            struct V;
            impl<'de> Visitor<'de> for V {
                type Value = OrderedKeys;
                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("object")
                }
                fn visit_map<A: MapAccess<'de>>(self, mut a: A) -> std::result::Result<OrderedKeys, A::Error> {
                    let mut out = Vec::new();
                    while let Some((k, _)) = a.next_entry::<String, serde::de::IgnoredAny>()? {
                        out.push(k);
                    }
                    Ok(OrderedKeys(out))
                }
            }
            d.deserialize_map(V)
        }
    }

    #[test]
    fn test_example_record_layout() {
        let formatter = JsonFormatter::new(standard_mapping());
        let mut record = LogRecord::new("app", LogLevel::Info, "Started application");
        record.insert_extra("note", "some extra info here").unwrap();

        let line = formatter.format(&record).unwrap();
        assert_eq!(keys(&line), vec!["level", "message", "timestamp", "note"]);

        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["message"], "Started application");
        assert_eq!(parsed["note"], "some extra info here");
    }

    #[test]
    fn test_timestamp_is_utc_iso8601() {
        let formatter = JsonFormatter::default();
        let record = LogRecord::new("app", LogLevel::Info, "tick");
        let parsed: Value = serde_json::from_str(&formatter.format(&record).unwrap()).unwrap();

        let stamp = parsed["timestamp"].as_str().unwrap();
        let when = chrono::DateTime::parse_from_rfc3339(stamp).unwrap();
        assert_eq!(when.offset().local_minus_utc(), 0);
        assert!(stamp.ends_with("+00:00"));
        assert!(stamp.contains('.'));
    }

    #[test]
    fn test_unmapped_implicit_fields_follow_mapping() {
        let formatter = JsonFormatter::new(FieldMapping::new().field("lvl", "levelname"));
        let record = LogRecord::new("app", LogLevel::Error, "boom")
            .with_exc_info(ErrorInfo::new("IoError", "disk full"))
            .with_stack_info("Stack:\n  frame 0");

        let line = formatter.format(&record).unwrap();
        assert_eq!(
            keys(&line),
            vec!["lvl", "message", "timestamp", "exc_info", "stack_info"]
        );
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["exc_info"], "IoError: disk full");
    }

    #[test]
    fn test_implicit_field_renamed_once() {
        let formatter = JsonFormatter::new(FieldMapping::new().field("msg_text", "message"));
        let record = LogRecord::new("app", LogLevel::Info, "hello");

        let line = formatter.format(&record).unwrap();
        assert_eq!(keys(&line), vec!["msg_text", "timestamp"]);
    }

    #[test]
    fn test_missing_attribute_is_error() {
        let formatter = JsonFormatter::new(FieldMapping::new().field("fn", "funcName"));
        let record = LogRecord::new("app", LogLevel::Info, "hello");

        let err = formatter.format(&record).unwrap_err();
        assert!(matches!(err, LoggerError::MissingAttribute(ref name) if name == "funcName"));
    }

    #[test]
    fn test_extra_overwrites_mapped_key_in_place() {
        let formatter = JsonFormatter::new(standard_mapping());
        let mut record = LogRecord::new("app", LogLevel::Info, "hello");
        record.insert_extra("level", "custom").unwrap();

        let line = formatter.format(&record).unwrap();
        assert_eq!(keys(&line), vec!["level", "message", "timestamp"]);
        assert!(line.starts_with(r#"{"level":"custom""#));
    }

    #[test]
    fn test_non_native_extra_values_stringified() {
        let formatter = JsonFormatter::default();
        let mut record = LogRecord::new("app", LogLevel::Info, "x");
        let err = std::io::Error::new(std::io::ErrorKind::Other, "broken pipe");
        record.insert_extra("cause", FieldValue::display(&err)).unwrap();
        record.insert_extra("ratio", f64::INFINITY).unwrap();

        let parsed: Value = serde_json::from_str(&formatter.format(&record).unwrap()).unwrap();
        assert_eq!(parsed["cause"], "broken pipe");
        assert_eq!(parsed["ratio"], "inf");
    }

    #[test]
    fn test_deterministic_output() {
        let formatter = JsonFormatter::new(standard_mapping()).with_indent(Some(2));
        let mut record = LogRecord::new("app", LogLevel::Info, "same");
        record.insert_extra("a", 1).unwrap();
        record.insert_extra("b", 2).unwrap();

        assert_eq!(formatter.format(&record).unwrap(), formatter.format(&record).unwrap());
    }

    #[test]
    fn test_indent_width() {
        let formatter = JsonFormatter::default().with_indent(Some(4));
        let record = LogRecord::new("app", LogLevel::Info, "pretty");
        let text = formatter.format(&record).unwrap();
        assert!(text.starts_with("{\n    \"message\": \"pretty\""));

        let compact = JsonFormatter::default().format(&record).unwrap();
        assert!(!compact.contains('\n'));
        assert!(!compact.contains(": "));
    }

    #[test]
    fn test_field_mapping_deserialize_keeps_order() {
        let mapping: FieldMapping =
            serde_json::from_str(r#"{"z":"levelname","a":"message","m":"timestamp"}"#).unwrap();
        let keys: Vec<&str> = mapping.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_text_formatter() {
        let formatter = TextFormatter::new("[{levelname}|{module}|L{lineno}] {asctime}: {message}")
            .with_datefmt(TimestampFormat::Custom("%Y".to_string()));
        let record = LogRecord::new("app", LogLevel::Warning, "disk at {}%")
            .with_args([91])
            .with_location("src/main.rs", 12, "my_app::main");

        let line = formatter.format(&record).unwrap();
        let year = record.created.format("%Y").to_string();
        assert_eq!(line, format!("[WARNING|main|L12] {}: disk at 91%", year));
    }

    #[test]
    fn test_text_formatter_appends_exception() {
        let formatter = TextFormatter::default();
        let record = LogRecord::new("app", LogLevel::Error, "failed")
            .with_exc_info(ErrorInfo::new("ParseError", "bad input"));
        assert_eq!(formatter.format(&record).unwrap(), "failed\nParseError: bad input");
    }
}
