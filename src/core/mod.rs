//! Core logger types and traits

pub mod error;
pub mod fallback;
pub mod formatter;
pub mod log_context;
pub mod log_level;
pub mod log_record;
pub mod metrics;
pub mod overflow_policy;
pub mod pipeline;
pub mod settings;
pub mod sink;
pub mod timestamp;

pub use error::{LoggerError, Result};
pub use fallback::{DeliveryFailure, FallbackReporter, StderrReporter};
pub use formatter::{formatter_for, Formatter, JsonFormatter, TextFormatter, DEFAULT_TEXT_FORMAT};
pub use log_context::{FieldValue, LogContext};
pub use log_level::LogLevel;
pub use log_record::{LogRecord, QueueEntry};
pub use metrics::PipelineMetrics;
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use pipeline::{
    DispatchPipeline, Dispatcher, EnqueueOutcome, PipelineState, StopReport,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use settings::Settings;
pub use sink::{Sink, WriteOutcome};
pub use timestamp::TimestampFormat;
