//! Console sink implementation

use crate::core::{LogLevel, LoggerError, Result, Sink, WriteOutcome};
use colored::Colorize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which standard stream a [`ConsoleSink`] writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleTarget {
    Stdout,
    #[default]
    Stderr,
}

/// Writes formatted records to stdout or stderr
///
/// Lines are written while holding the stream lock, so concurrent records
/// never interleave.
///
/// # Example
///
/// ```
/// use domain_logger::core::LogLevel;
/// use domain_logger::sinks::{ConsoleSink, ConsoleTarget};
///
/// let sink = ConsoleSink::new()
///     .with_target(ConsoleTarget::Stdout)
///     .with_threshold(LogLevel::Warning)
///     .with_colors(true);
/// ```
#[derive(Debug)]
pub struct ConsoleSink {
    target: ConsoleTarget,
    threshold: LogLevel,
    use_colors: bool,
    closed: AtomicBool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            target: ConsoleTarget::default(),
            threshold: LogLevel::Debug,
            use_colors: false,
            closed: AtomicBool::new(false),
        }
    }

    pub fn stdout() -> Self {
        Self::new().with_target(ConsoleTarget::Stdout)
    }

    #[must_use]
    pub fn with_target(mut self, target: ConsoleTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: LogLevel) -> Self {
        self.threshold = threshold;
        self
    }

    /// Colour each line by its level
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }

    fn write_to(&self, out: &mut dyn Write, bytes: &[u8], level: LogLevel) -> std::io::Result<()> {
        if self.use_colors {
            let text = String::from_utf8_lossy(bytes);
            let line = text.strip_suffix('\n').unwrap_or(&text);
            writeln!(out, "{}", line.color(level.color_code()))
        } else {
            out.write_all(bytes)
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn write(&self, bytes: &[u8], level: LogLevel) -> Result<WriteOutcome> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LoggerError::sink_closed(self.name()));
        }
        if !self.accepts(level) {
            return Ok(WriteOutcome::Filtered);
        }

        let result = match self.target {
            ConsoleTarget::Stdout => self.write_to(&mut std::io::stdout().lock(), bytes, level),
            ConsoleTarget::Stderr => self.write_to(&mut std::io::stderr().lock(), bytes, level),
        };
        result.map_err(|e| LoggerError::sink_write(self.name(), e.to_string()))?;
        Ok(WriteOutcome::Written)
    }

    fn flush(&self) -> Result<()> {
        match self.target {
            ConsoleTarget::Stdout => std::io::stdout().flush()?,
            ConsoleTarget::Stderr => std::io::stderr().flush()?,
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.flush()
    }

    fn threshold(&self) -> LogLevel {
        self.threshold
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_stderr() {
        let sink = ConsoleSink::new();
        assert_eq!(sink.target(), ConsoleTarget::Stderr);
        assert_eq!(sink.threshold(), LogLevel::Debug);
    }

    #[test]
    fn test_threshold_filters() {
        let sink = ConsoleSink::new().with_threshold(LogLevel::Error);
        let outcome = sink.write(b"ignored\n", LogLevel::Info).unwrap();
        assert_eq!(outcome, WriteOutcome::Filtered);
    }

    #[test]
    fn test_write_after_close_fails() {
        let sink = ConsoleSink::new();
        sink.close().unwrap();
        assert!(sink.is_closed());
        assert!(matches!(
            sink.write(b"late\n", LogLevel::Critical),
            Err(LoggerError::SinkClosed { .. })
        ));
        // Closing twice is harmless
        sink.close().unwrap();
    }
}
