//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. The message is only
//! formatted when the domain's level lets the record through.
//!
//! # Examples
//!
//! ```
//! use domain_logger::prelude::*;
//! use domain_logger::info;
//!
//! let manager = DomainManager::new();
//! let logger = manager.get_logger("server", None).unwrap();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// Log a message at the given level with automatic formatting.
///
/// # Examples
///
/// ```
/// # use domain_logger::prelude::*;
/// # let manager = DomainManager::new();
/// # let logger = manager.get_logger("app", None).unwrap();
/// use domain_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled_for(level) {
            logger.log(level, format!($($arg)+));
        }
    }};
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use domain_logger::prelude::*;
/// # let manager = DomainManager::new();
/// # let logger = manager.get_logger("app", None).unwrap();
/// use domain_logger::debug;
/// debug!(logger, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use domain_logger::prelude::*;
/// # let manager = DomainManager::new();
/// # let logger = manager.get_logger("app", None).unwrap();
/// use domain_logger::info;
/// info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
///
/// # Examples
///
/// ```
/// # use domain_logger::prelude::*;
/// # let manager = DomainManager::new();
/// # let logger = manager.get_logger("app", None).unwrap();
/// use domain_logger::warning;
/// warning!(logger, "Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Warning, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use domain_logger::prelude::*;
/// # let manager = DomainManager::new();
/// # let logger = manager.get_logger("app", None).unwrap();
/// use domain_logger::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Error, $($arg)+)
    };
}

/// Log a critical-level message.
///
/// # Examples
///
/// ```
/// # use domain_logger::prelude::*;
/// # let manager = DomainManager::new();
/// # let logger = manager.get_logger("app", None).unwrap();
/// use domain_logger::critical;
/// critical!(logger, "Unable to recover from error: {}", "disk full");
/// ```
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Critical, $($arg)+)
    };
}
