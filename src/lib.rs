//! # Domain Logger
//!
//! Domain-isolated log delivery. Every logging domain (`api`, `core`, ...) owns
//! its own settings, formatter, sinks and dispatch pipeline, so reconfiguring
//! or shutting down one domain never touches another.
//!
//! ## Features
//!
//! - **Asynchronous dispatch**: a bounded queue per domain drained by one
//!   worker thread, preserving per-domain FIFO order
//! - **Bounded memory**: full queues drop (or briefly block) and count
//! - **Failure isolation**: a failing sink never blocks the others or the caller
//! - **Text and JSON output**: `%(key)s` templates or one JSON object per line
//! - **Size-rotating files**: numbered backups, optionally gzipped
//!
//! ## Example
//!
//! ```
//! use domain_logger::prelude::*;
//!
//! let manager = DomainManager::new();
//! manager.configure("api", Settings::default().with_json(true)).unwrap();
//! manager.configure("core", Settings::default().with_level(LogLevel::Debug)).unwrap();
//!
//! let api = manager.get_logger("api", Some("handlers")).unwrap();
//! api.info("request served");
//!
//! for report in manager.shutdown_all() {
//!     report.into_result().unwrap();
//! }
//! ```

pub mod core;
pub mod macros;
pub mod manager;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        FallbackReporter, FieldValue, LogContext, LogLevel, LoggerError, OverflowPolicy,
        PipelineMetrics, Result, Settings, Sink, WriteOutcome,
    };
    pub use crate::manager::{
        DefaultSinkFactory, DomainLogger, DomainManager, DomainStatus, ShutdownReport,
        SinkFactory, SinkList,
    };
    pub use crate::sinks::{ConsoleSink, MemorySink, RotatingFileSink};
}

pub use crate::core::{
    FieldValue, LogContext, LogLevel, LoggerError, OverflowCallback, OverflowPolicy,
    PipelineMetrics, Result, Settings, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::manager::{DomainLogger, DomainManager, DomainStatus, ShutdownReport};
