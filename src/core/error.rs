//! Error types for the domain logger

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// A sink rejected or failed a write
    #[error("Sink '{sink}' failed to write: {message}")]
    SinkWrite { sink: String, message: String },

    /// Write attempted on a sink that was already closed
    #[error("Sink '{sink}' is closed")]
    SinkClosed { sink: String },

    /// Queue overflow with dropped message count
    #[error("Log queue overflow: dropped {dropped_count} messages")]
    QueueOverflow { dropped_count: u64 },

    /// One or more sinks failed to close during shutdown
    #[error("Shutdown of domain '{domain}' completed with {} sink failure(s): {}", .failures.len(), .failures.join("; "))]
    Shutdown { domain: String, failures: Vec<String> },

    /// File sink error with path
    #[error("File sink error for '{path}': {message}")]
    FileSink { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotation { path: String, message: String },

    /// Drain worker could not be started
    #[error("Failed to start drain worker for domain '{domain}': {message}")]
    WorkerSpawn { domain: String, message: String },
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn sink_write(sink: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::SinkWrite {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn sink_closed(sink: impl Into<String>) -> Self {
        LoggerError::SinkClosed { sink: sink.into() }
    }

    /// Create a queue overflow error
    pub fn queue_overflow(dropped_count: u64) -> Self {
        LoggerError::QueueOverflow { dropped_count }
    }

    pub fn shutdown(domain: impl Into<String>, failures: Vec<String>) -> Self {
        LoggerError::Shutdown {
            domain: domain.into(),
            failures,
        }
    }

    /// Create a file sink error
    pub fn file_sink(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileSink {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn worker_spawn(domain: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::WorkerSpawn {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a configuration mistake (the only kind surfaced to callers)
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, LoggerError::InvalidConfiguration { .. })
    }
}
