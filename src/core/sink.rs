//! Sink trait for log output destinations

use super::{error::Result, log_level::LogLevel};

/// Result of offering bytes to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The bytes were accepted and written
    Written,
    /// The record was below the sink's threshold
    Filtered,
}

/// A destination for formatted log output
///
/// Sinks are shared between producer threads (inline delivery) and the drain
/// worker, so every method takes `&self` and implementations synchronize
/// internally. Custom transports implement this trait directly.
///
/// # Example
///
/// ```
/// use domain_logger::core::{LogLevel, Result, Sink, WriteOutcome};
/// use parking_lot::Mutex;
///
/// struct LineCounter {
///     lines: Mutex<usize>,
/// }
///
/// impl Sink for LineCounter {
///     fn write(&self, bytes: &[u8], level: LogLevel) -> Result<WriteOutcome> {
///         if !self.accepts(level) {
///             return Ok(WriteOutcome::Filtered);
///         }
///         *self.lines.lock() += bytes.iter().filter(|b| **b == b'\n').count();
///         Ok(WriteOutcome::Written)
///     }
///
///     fn name(&self) -> &str {
///         "line_counter"
///     }
/// }
/// ```
pub trait Sink: Send + Sync {
    /// Write one formatted record if `level` meets this sink's threshold
    fn write(&self, bytes: &[u8], level: LogLevel) -> Result<WriteOutcome>;

    /// Push buffered bytes to the underlying handle
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Flush and release the underlying handle; later writes fail
    fn close(&self) -> Result<()> {
        self.flush()
    }

    /// Minimum level this sink accepts
    fn threshold(&self) -> LogLevel {
        LogLevel::Debug
    }

    fn accepts(&self, level: LogLevel) -> bool {
        level >= self.threshold()
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn name(&self) -> &str;
}
