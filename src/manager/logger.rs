//! Producer-side handle of a domain

use super::domain_manager::{DomainSlot, DomainStatus};
use crate::core::{FieldValue, LogContext, LogLevel, LogRecord};
use std::fmt;
use std::sync::Arc;

/// Cheap, cloneable handle that routes records to one domain
///
/// Handles never block longer than the domain's overflow policy allows and
/// never return delivery errors. They keep following the domain across
/// reconfiguration, and after shutdown their records are counted as
/// rejected.
///
/// # Example
///
/// ```
/// use domain_logger::core::Settings;
/// use domain_logger::manager::DomainManager;
///
/// let manager = DomainManager::new();
/// manager.configure("payments", Settings::default()).unwrap();
///
/// let logger = manager
///     .get_logger("payments", None)
///     .unwrap()
///     .bind("request_id", "r-42");
/// logger.child("refunds").warning("refund above threshold");
/// ```
#[derive(Clone)]
pub struct DomainLogger {
    slot: Arc<DomainSlot>,
    name: String,
    bound: LogContext,
}

impl DomainLogger {
    pub(crate) fn new(slot: Arc<DomainSlot>, name: String) -> Self {
        Self {
            slot,
            name,
            bound: LogContext::new(),
        }
    }

    /// Domain this handle routes to
    pub fn domain(&self) -> &str {
        self.slot.name()
    }

    /// Full logger name, `domain` or `domain.sub`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> DomainStatus {
        self.slot.status()
    }

    /// Handle for `<name>.<subname>` on the same domain, keeping bound fields
    #[must_use]
    pub fn child(&self, subname: &str) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            name: format!("{}.{}", self.name, subname),
            bound: self.bound.clone(),
        }
    }

    /// Handle that attaches `key=value` to every record it emits
    #[must_use]
    pub fn bind<K, V>(&self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut logger = self.clone();
        logger.bound.add_field(key, value);
        logger
    }

    pub fn is_enabled_for(&self, level: LogLevel) -> bool {
        level >= self.slot.level()
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.emit(level, message.as_ref(), None);
    }

    /// Log with extra fields; per-call fields win over bound ones
    pub fn log_with_context(&self, level: LogLevel, message: impl AsRef<str>, context: LogContext) {
        self.emit(level, message.as_ref(), Some(context));
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Critical, message);
    }

    fn emit(&self, level: LogLevel, message: &str, context: Option<LogContext>) {
        if !self.is_enabled_for(level) {
            return;
        }

        let mut context = context.unwrap_or_default();
        context.merge_missing(&self.bound);

        let mut record = LogRecord::new(self.name.as_str(), level, message);
        if !context.is_empty() {
            record = record.with_context(context);
        }
        self.slot.dispatch(record);
    }
}

impl fmt::Debug for DomainLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainLogger")
            .field("domain", &self.domain())
            .field("name", &self.name)
            .field("bound", &self.bound)
            .finish()
    }
}
