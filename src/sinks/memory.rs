//! In-memory sink for tests and embedding

use crate::core::{LogLevel, LoggerError, Result, Sink, WriteOutcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Captures every written record in memory
///
/// Share it as `Arc<MemorySink>` and hand a clone to the domain, then inspect
/// the captured output after shutdown.
///
/// # Example
///
/// ```
/// use domain_logger::core::{LogLevel, Sink};
/// use domain_logger::sinks::MemorySink;
///
/// let sink = MemorySink::new();
/// sink.write(b"hello\n", LogLevel::Info).unwrap();
/// assert_eq!(sink.lines(), vec!["hello"]);
/// ```
#[derive(Debug)]
pub struct MemorySink {
    name: String,
    threshold: LogLevel,
    records: Mutex<Vec<(LogLevel, Vec<u8>)>>,
    flushes: AtomicUsize,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            threshold: LogLevel::Debug,
            records: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: LogLevel) -> Self {
        self.threshold = threshold;
        self
    }

    /// Number of records written
    pub fn write_count(&self) -> usize {
        self.records.lock().len()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Every written record as raw bytes, in write order
    pub fn records(&self) -> Vec<Vec<u8>> {
        self.records.lock().iter().map(|(_, bytes)| bytes.clone()).collect()
    }

    pub fn levels(&self) -> Vec<LogLevel> {
        self.records.lock().iter().map(|(level, _)| *level).collect()
    }

    /// Every written record as text without its trailing newline
    pub fn lines(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|(_, bytes)| {
                let text = String::from_utf8_lossy(bytes);
                text.strip_suffix('\n').unwrap_or(&text).to_string()
            })
            .collect()
    }

    /// All captured output concatenated
    pub fn contents(&self) -> String {
        self.records
            .lock()
            .iter()
            .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn write(&self, bytes: &[u8], level: LogLevel) -> Result<WriteOutcome> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LoggerError::sink_closed(&self.name));
        }
        if !self.accepts(level) {
            return Ok(WriteOutcome::Filtered);
        }
        self.records.lock().push((level, bytes.to_vec()));
        Ok(WriteOutcome::Written)
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn threshold(&self) -> LogLevel {
        self.threshold
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
