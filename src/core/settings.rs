//! Per-domain logging settings
//!
//! `Settings` is a plain value: build it programmatically, deserialize it with
//! serde, or resolve it from `LOG_`-prefixed environment variables. It is
//! validated when a domain is configured and never mutated afterwards.

use super::error::{LoggerError, Result};
use super::formatter::DEFAULT_TEXT_FORMAT;
use super::log_level::LogLevel;
use super::overflow_policy::OverflowPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Prefix of the environment variables read by [`Settings::from_env`]
pub const ENV_PREFIX: &str = "LOG_";

pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_BACKUP_COUNT: usize = 5;

/// Configuration of one logging domain
///
/// # Example
///
/// ```
/// use domain_logger::core::{LogLevel, Settings};
///
/// let settings = Settings::default()
///     .with_level(LogLevel::Debug)
///     .with_json(true)
///     .with_use_async(false);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Domain name used by `DomainManager::configure_named`
    pub name: String,
    /// Minimum level a record needs to be emitted
    pub level: LogLevel,
    /// Render records as JSON objects instead of the text template
    pub json: bool,
    /// Text template, see `TextFormatter`
    pub format: String,
    /// Deliver through a queue drained by a background worker
    pub use_async: bool,
    /// Queue capacity in async mode
    pub max_queue_size: usize,
    /// Directory of the rotating log file; file output needs both dir and file
    pub log_dir: Option<PathBuf>,
    /// Base file name of the rotating log file
    pub log_file: Option<String>,
    /// Size bound of the active log file before rotation
    pub max_bytes: u64,
    /// Number of rotated backups to keep
    pub backup_count: usize,
    /// What to do with records that do not fit in the queue
    #[serde(skip)]
    pub overflow_policy: OverflowPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: String::new(),
            level: LogLevel::Info,
            json: false,
            format: DEFAULT_TEXT_FORMAT.to_string(),
            use_async: true,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            log_dir: None,
            log_file: None,
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    #[must_use]
    pub fn with_use_async(mut self, use_async: bool) -> Self {
        self.use_async = use_async;
        self
    }

    #[must_use]
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Enable rotating file output at `dir/file`
    #[must_use]
    pub fn with_file(mut self, dir: impl Into<PathBuf>, file: impl Into<String>) -> Self {
        self.log_dir = Some(dir.into());
        self.log_file = Some(file.into());
        self
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use]
    pub fn with_backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Full path of the rotating log file, when file output is enabled
    pub fn log_path(&self) -> Option<PathBuf> {
        match (&self.log_dir, &self.log_file) {
            (Some(dir), Some(file)) => Some(dir.join(file)),
            _ => None,
        }
    }

    /// Check the value constraints a domain relies on
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::InvalidConfiguration`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            return Err(LoggerError::config(
                "Settings",
                "max_queue_size must be greater than 0",
            ));
        }
        if self.max_bytes == 0 {
            return Err(LoggerError::config("Settings", "max_bytes must be greater than 0"));
        }
        if let Some(ref file) = self.log_file {
            if file.trim().is_empty() {
                return Err(LoggerError::config("Settings", "log_file must not be empty"));
            }
        }
        if let OverflowPolicy::BlockWithTimeout(timeout) = self.overflow_policy {
            if timeout.is_zero() {
                return Err(LoggerError::config(
                    "Settings",
                    "overflow block timeout must be greater than 0",
                ));
            }
        }
        Ok(())
    }

    /// Resolve settings from the process environment (`LOG_LEVEL`, `LOG_JSON`, ...)
    ///
    /// Variable names are matched case-insensitively. Unset variables keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::InvalidConfiguration`] when a variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Resolve settings from arbitrary `(name, value)` pairs using the
    /// environment naming scheme
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::InvalidConfiguration`] when a value cannot be parsed.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut settings = Self::default();

        for (key, value) in vars {
            let key = key.as_ref().to_uppercase();
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value: String = value.into();

            match field {
                "NAME" => settings.name = value,
                "LEVEL" => {
                    settings.level = LogLevel::from_str(&value)
                        .map_err(|e| LoggerError::config("LOG_LEVEL", e))?;
                }
                "JSON" => settings.json = parse_bool(&key, &value)?,
                "FORMAT" => settings.format = value,
                "USE_ASYNC" => settings.use_async = parse_bool(&key, &value)?,
                "MAX_QUEUE_SIZE" => settings.max_queue_size = parse_number(&key, &value)?,
                "DIR" => settings.log_dir = Some(PathBuf::from(value)),
                "FILE" => settings.log_file = Some(value),
                "MAX_BYTES" => settings.max_bytes = parse_number(&key, &value)?,
                "BACKUP_FILES_COUNT" => settings.backup_count = parse_number(&key, &value)?,
                "OVERFLOW_BLOCK_MS" => {
                    let millis: u64 = parse_number(&key, &value)?;
                    settings.overflow_policy =
                        OverflowPolicy::BlockWithTimeout(Duration::from_millis(millis));
                }
                _ => {}
            }
        }

        Ok(settings)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(LoggerError::config(
            key,
            format!("expected a boolean, got '{}'", other),
        )),
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LoggerError::config(key, format!("invalid number '{}': {}", value, e)))
}
