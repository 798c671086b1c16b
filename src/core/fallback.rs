//! Fallback reporting channel
//!
//! Delivery failures are absorbed by the pipeline and surfaced here instead of
//! to producers. The reporter is independent of every sink so a broken sink can
//! still be reported.

use super::error::LoggerError;
use std::fmt;

/// A runtime failure the pipeline recovered from
#[derive(Debug)]
pub enum DeliveryFailure<'a> {
    /// A sink returned an error while writing a record
    SinkWrite {
        domain: &'a str,
        sink: &'a str,
        error: &'a LoggerError,
    },
    /// A sink panicked while writing or flushing
    SinkPanic {
        domain: &'a str,
        sink: &'a str,
        message: &'a str,
    },
    /// A sink failed to flush
    SinkFlush {
        domain: &'a str,
        sink: &'a str,
        error: &'a LoggerError,
    },
    /// Records were dropped because the queue was full
    QueueOverflow { domain: &'a str, dropped_total: u64 },
    /// Records were still queued when the stop deadline passed
    StopTimeout { domain: &'a str, dropped: u64 },
    /// A sink failed to close while its domain was being replaced or shut down
    SinkClose {
        domain: &'a str,
        sink: &'a str,
        error: &'a LoggerError,
    },
}

impl DeliveryFailure<'_> {
    pub fn domain(&self) -> &str {
        match self {
            DeliveryFailure::SinkWrite { domain, .. }
            | DeliveryFailure::SinkPanic { domain, .. }
            | DeliveryFailure::SinkFlush { domain, .. }
            | DeliveryFailure::QueueOverflow { domain, .. }
            | DeliveryFailure::StopTimeout { domain, .. }
            | DeliveryFailure::SinkClose { domain, .. } => domain,
        }
    }
}

impl fmt::Display for DeliveryFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryFailure::SinkWrite { domain, sink, error } => {
                write!(f, "[{}] sink '{}' failed: {}", domain, sink, error)
            }
            DeliveryFailure::SinkPanic { domain, sink, message } => write!(
                f,
                "[{}] sink '{}' panicked: {}. Other sinks continue to function.",
                domain, sink, message
            ),
            DeliveryFailure::SinkFlush { domain, sink, error } => {
                write!(f, "[{}] sink '{}' flush failed: {}", domain, sink, error)
            }
            DeliveryFailure::QueueOverflow { domain, dropped_total } => write!(
                f,
                "[{}] queue full, {} records dropped. \
                 Consider increasing max_queue_size or using a blocking overflow policy.",
                domain, dropped_total
            ),
            DeliveryFailure::StopTimeout { domain, dropped } => write!(
                f,
                "[{}] drain worker did not finish before the deadline, {} queued records dropped",
                domain, dropped
            ),
            DeliveryFailure::SinkClose { domain, sink, error } => {
                write!(f, "[{}] sink '{}' failed to close: {}", domain, sink, error)
            }
        }
    }
}

/// Receiver of delivery failures
pub trait FallbackReporter: Send + Sync {
    fn report(&self, failure: &DeliveryFailure<'_>);
}

/// Writes failures to stderr, the default fallback channel
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrReporter;

impl FallbackReporter for StderrReporter {
    fn report(&self, failure: &DeliveryFailure<'_>) {
        match failure {
            DeliveryFailure::SinkPanic { .. } => eprintln!("[LOGGER CRITICAL] {}", failure),
            DeliveryFailure::QueueOverflow { .. } | DeliveryFailure::StopTimeout { .. } => {
                eprintln!("[LOGGER WARNING] {}", failure)
            }
            _ => eprintln!("[LOGGER ERROR] {}", failure),
        }
    }
}
