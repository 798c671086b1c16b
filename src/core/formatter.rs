//! Record formatters
//!
//! A formatter turns one [`LogRecord`] into the exact bytes a sink writes.
//! Formatters are stateless after construction and shared by every sink of a
//! domain, so each record is rendered once no matter how many sinks receive it.

use super::log_record::LogRecord;
use super::settings::Settings;
use super::timestamp::TimestampFormat;
use std::sync::Arc;

/// Default text template, `%(key)s` placeholders
pub const DEFAULT_TEXT_FORMAT: &str = "%(asctime)s - %(name)s - %(levelname)s - %(message)s";

/// Renders a record to bytes. Implementations must be pure.
pub trait Formatter: Send + Sync {
    fn render(&self, record: &LogRecord) -> Vec<u8>;

    fn name(&self) -> &str;
}

/// Build the formatter a domain's settings ask for
pub fn formatter_for(settings: &Settings) -> Arc<dyn Formatter> {
    if settings.json {
        Arc::new(JsonFormatter::new())
    } else {
        Arc::new(TextFormatter::new(&settings.format))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Asctime,
    Name,
    LevelName,
    LevelNo,
    Message,
    ThreadName,
    Context,
}

impl Field {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "asctime" => Some(Field::Asctime),
            "name" => Some(Field::Name),
            "levelname" => Some(Field::LevelName),
            "levelno" => Some(Field::LevelNo),
            "message" => Some(Field::Message),
            "threadName" => Some(Field::ThreadName),
            "context" => Some(Field::Context),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// Template-driven text formatter
///
/// Supported placeholders: `%(asctime)s`, `%(name)s`, `%(levelname)s`,
/// `%(levelno)s`, `%(message)s`, `%(threadName)s` and `%(context)s`.
/// `%%` renders a literal `%`; unknown placeholders are emitted verbatim.
///
/// # Example
///
/// ```
/// use domain_logger::core::{Formatter, LogLevel, LogRecord, TextFormatter};
///
/// let formatter = TextFormatter::new("%(levelname)s - %(message)s");
/// let record = LogRecord::new("api", LogLevel::Warning, "disk almost full");
/// assert_eq!(formatter.render(&record), b"WARNING - disk almost full\n");
/// ```
#[derive(Debug, Clone)]
pub struct TextFormatter {
    template: String,
    segments: Vec<Segment>,
    timestamp_format: TimestampFormat,
}

impl TextFormatter {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            segments: Self::compile(template),
            timestamp_format: TimestampFormat::Asctime,
        }
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn compile(template: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(pos) = rest.find('%') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("%%") {
                literal.push('%');
                rest = &tail[2..];
                continue;
            }

            let placeholder = tail
                .strip_prefix("%(")
                .and_then(|inner| inner.find(")s").map(|end| (&inner[..end], end + 4)));

            match placeholder.and_then(|(key, len)| Field::parse(key).map(|f| (f, len))) {
                Some((field, len)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                    rest = &tail[len..];
                }
                None => {
                    literal.push('%');
                    rest = &tail[1..];
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        segments
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_FORMAT)
    }
}

impl Formatter for TextFormatter {
    fn render(&self, record: &LogRecord) -> Vec<u8> {
        let mut line = String::with_capacity(self.template.len() + record.message.len() + 32);

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => line.push_str(text),
                Segment::Field(Field::Asctime) => {
                    line.push_str(&self.timestamp_format.format(&record.timestamp))
                }
                Segment::Field(Field::Name) => line.push_str(&record.logger),
                Segment::Field(Field::LevelName) => line.push_str(record.level.to_str()),
                Segment::Field(Field::LevelNo) => {
                    line.push_str(&record.level.as_number().to_string())
                }
                Segment::Field(Field::Message) => line.push_str(&record.message),
                Segment::Field(Field::ThreadName) => line.push_str(&record.thread_name),
                Segment::Field(Field::Context) => {
                    if let Some(ref context) = record.context {
                        line.push_str(&context.format_fields());
                    }
                }
            }
        }

        line.push('\n');
        line.into_bytes()
    }

    fn name(&self) -> &str {
        "text"
    }
}

/// One JSON object per line: `timestamp`, `level`, `logger`, `message` and
/// `context` when the record carries one.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    timestamp_format: TimestampFormat,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            timestamp_format: TimestampFormat::Iso8601Micros,
        }
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for JsonFormatter {
    fn render(&self, record: &LogRecord) -> Vec<u8> {
        let mut json_obj = serde_json::Map::new();

        json_obj.insert(
            "timestamp".to_string(),
            serde_json::Value::String(self.timestamp_format.format(&record.timestamp)),
        );
        json_obj.insert(
            "level".to_string(),
            serde_json::Value::String(record.level.to_str().to_string()),
        );
        json_obj.insert(
            "logger".to_string(),
            serde_json::Value::String(record.logger.clone()),
        );
        json_obj.insert(
            "message".to_string(),
            serde_json::Value::String(record.message.clone()),
        );
        if let Some(ref context) = record.context {
            json_obj.insert("context".to_string(), context.to_json_value());
        }

        // Serializing a map of plain values cannot fail
        let mut bytes = serde_json::to_vec(&serde_json::Value::Object(json_obj)).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }

    fn name(&self) -> &str {
        "json"
    }
}
