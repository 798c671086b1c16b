//! Log record and queue entry structures

use super::log_context::LogContext;
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::time::Instant;

thread_local! {
    static THREAD_NAME_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Name of the producing thread, falling back to its id for unnamed threads.
fn current_thread_name() -> String {
    THREAD_NAME_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        cache
            .get_or_insert_with(|| {
                let thread = std::thread::current();
                thread
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("{:?}", thread.id()))
            })
            .clone()
    })
}

/// A single log event, produced by a call site and consumed by a formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Dot-qualified logger name (`domain` or `domain.sub.module`)
    pub logger: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub thread_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<LogContext>,
}

impl LogRecord {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// so one record always renders as one line.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(logger: impl Into<String>, level: LogLevel, message: impl AsRef<str>) -> Self {
        Self {
            logger: logger.into(),
            level,
            message: Self::sanitize_message(message.as_ref()),
            timestamp: Utc::now(),
            thread_name: current_thread_name(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A record in transit through a dispatch queue
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub record: LogRecord,
    pub enqueued_at: Instant,
}

impl QueueEntry {
    pub fn new(record: LogRecord) -> Self {
        Self {
            record,
            enqueued_at: Instant::now(),
        }
    }
}
