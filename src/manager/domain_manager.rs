//! Registry of isolated logging domains
//!
//! Each domain owns its settings, formatter, sinks and dispatch pipeline. The
//! registry map is locked only to look up or insert a domain; every domain has
//! its own `RwLock`, held for reading by producers and for writing by
//! `configure` and `shutdown`. Distinct domains never contend with each other.

use super::factory::{DefaultSinkFactory, SinkFactory, SinkList};
use super::logger::DomainLogger;
use crate::core::{
    formatter_for, DeliveryFailure, DispatchPipeline, Dispatcher, EnqueueOutcome,
    FallbackReporter, LogLevel, LogRecord, LoggerError, OverflowCallback, PipelineMetrics,
    Result, Settings, StderrReporter, DEFAULT_SHUTDOWN_TIMEOUT,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle of a domain as seen by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainStatus {
    Unconfigured,
    Configured,
    Shutdown,
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DomainStatus::Unconfigured => "UNCONFIGURED",
            DomainStatus::Configured => "CONFIGURED",
            DomainStatus::Shutdown => "SHUTDOWN",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of shutting a domain down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub domain: String,
    pub status: DomainStatus,
    /// The domain was already shut down; nothing was done
    pub already_shut_down: bool,
    /// Records still queued when the drain deadline passed
    pub dropped_on_stop: u64,
    pub timed_out: bool,
    /// One message per sink that failed to close
    pub close_errors: Vec<String>,
}

impl ShutdownReport {
    fn new(domain: &str, status: DomainStatus) -> Self {
        Self {
            domain: domain.to_string(),
            status,
            already_shut_down: false,
            dropped_on_stop: 0,
            timed_out: false,
            close_errors: Vec::new(),
        }
    }

    /// Every sink closed and nothing was dropped
    pub fn is_clean(&self) -> bool {
        self.close_errors.is_empty() && self.dropped_on_stop == 0
    }

    /// Turn sink close failures into an error
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Shutdown`] listing every sink that failed to close.
    pub fn into_result(self) -> Result<()> {
        if self.close_errors.is_empty() {
            Ok(())
        } else {
            Err(LoggerError::shutdown(self.domain, self.close_errors))
        }
    }
}

pub(crate) struct DomainState {
    settings: Settings,
    pipeline: DispatchPipeline,
    status: DomainStatus,
}

/// One registry entry; shared by the manager and every handle of the domain
pub(crate) struct DomainSlot {
    name: String,
    state: RwLock<DomainState>,
}

impl DomainSlot {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn level(&self) -> LogLevel {
        self.state.read().settings.level
    }

    pub(crate) fn status(&self) -> DomainStatus {
        self.state.read().status
    }

    /// Route a record to the domain's current pipeline
    pub(crate) fn dispatch(&self, record: LogRecord) -> EnqueueOutcome {
        self.state.read().pipeline.enqueue(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstallMode {
    Replace,
    IfAbsent,
}

/// Builder for [`DomainManager`]
///
/// # Example
///
/// ```
/// use domain_logger::manager::DomainManager;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let manager = DomainManager::builder()
///     .shutdown_timeout(Duration::from_secs(2))
///     .on_overflow(Arc::new(|dropped| eprintln!("{} records dropped", dropped)))
///     .build();
/// ```
pub struct DomainManagerBuilder {
    shutdown_timeout: Duration,
    reporter: Arc<dyn FallbackReporter>,
    on_overflow: Option<OverflowCallback>,
    sink_factory: Arc<dyn SinkFactory>,
    default_settings: Settings,
}

impl DomainManagerBuilder {
    pub fn new() -> Self {
        Self {
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            reporter: Arc::new(StderrReporter),
            on_overflow: None,
            sink_factory: Arc::new(DefaultSinkFactory),
            default_settings: Settings::default(),
        }
    }

    /// How long `shutdown` and `configure` wait for a queue to drain
    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Where delivery failures are reported (stderr by default)
    #[must_use = "builder methods return a new value"]
    pub fn reporter(mut self, reporter: Arc<dyn FallbackReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Called with the running drop total on the first overflow drop and
    /// every 1000th after
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    /// Replace the default console + file factory used by `configure`
    #[must_use = "builder methods return a new value"]
    pub fn sink_factory<F: SinkFactory + 'static>(mut self, factory: F) -> Self {
        self.sink_factory = Arc::new(factory);
        self
    }

    /// Settings used when `get_logger` meets a domain nobody configured
    #[must_use = "builder methods return a new value"]
    pub fn default_settings(mut self, settings: Settings) -> Self {
        self.default_settings = settings;
        self
    }

    pub fn build(self) -> DomainManager {
        DomainManager {
            domains: Mutex::new(HashMap::new()),
            shutdown_timeout: self.shutdown_timeout,
            reporter: self.reporter,
            on_overflow: self.on_overflow,
            sink_factory: self.sink_factory,
            default_settings: self.default_settings,
        }
    }
}

impl Default for DomainManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns every logging domain of a process (or of a test)
///
/// # Example
///
/// ```
/// use domain_logger::core::{LogLevel, Settings};
/// use domain_logger::manager::{DomainManager, DomainStatus};
///
/// let manager = DomainManager::new();
/// manager
///     .configure("api", Settings::default().with_json(true).with_level(LogLevel::Debug))
///     .unwrap();
///
/// let logger = manager.get_logger("api", Some("handlers")).unwrap();
/// logger.info("request served");
///
/// let report = manager.shutdown("api");
/// assert_eq!(report.status, DomainStatus::Shutdown);
/// ```
pub struct DomainManager {
    domains: Mutex<HashMap<String, Arc<DomainSlot>>>,
    shutdown_timeout: Duration,
    reporter: Arc<dyn FallbackReporter>,
    on_overflow: Option<OverflowCallback>,
    sink_factory: Arc<dyn SinkFactory>,
    default_settings: Settings,
}

impl DomainManager {
    pub fn new() -> Self {
        DomainManagerBuilder::new().build()
    }

    pub fn builder() -> DomainManagerBuilder {
        DomainManagerBuilder::new()
    }

    /// Configure `domain`, replacing any previous configuration
    ///
    /// The settings are validated before the domain is touched. The previous
    /// pipeline is then drained, the new sinks built, and the old sinks closed
    /// before the new ones receive records. A domain that was shut down is
    /// revived.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::InvalidConfiguration`] for an empty domain name or
    /// invalid settings, and the sink factory's error when a sink cannot be
    /// created. In every error case the domain keeps its previous settings
    /// and sinks.
    pub fn configure(&self, domain: &str, settings: Settings) -> Result<()> {
        let factory = Arc::clone(&self.sink_factory);
        self.install(domain, settings, factory.as_ref(), InstallMode::Replace)
            .map(|_| ())
    }

    /// Like [`configure`](Self::configure) with a one-off sink factory
    ///
    /// # Errors
    ///
    /// Same as [`configure`](Self::configure).
    pub fn configure_with<F: SinkFactory>(
        &self,
        domain: &str,
        settings: Settings,
        factory: F,
    ) -> Result<()> {
        self.install(domain, settings, &factory, InstallMode::Replace)
            .map(|_| ())
    }

    /// Configure the domain named by `settings.name`
    ///
    /// # Errors
    ///
    /// Same as [`configure`](Self::configure); an empty name is rejected.
    pub fn configure_named(&self, settings: Settings) -> Result<()> {
        let domain = settings.name.clone();
        self.configure(&domain, settings)
    }

    /// Handle for `domain`, or for `domain.subname` when a subname is given
    ///
    /// A domain nobody configured is configured with the default settings. A
    /// domain that was shut down still yields a handle; its records are
    /// counted as rejected.
    ///
    /// # Errors
    ///
    /// Returns an error only when auto-configuration fails.
    pub fn get_logger(&self, domain: &str, subname: Option<&str>) -> Result<DomainLogger> {
        let slot = match self.lookup(domain) {
            Some(slot) => slot,
            None => {
                let settings = self.default_settings.clone().with_name(domain);
                let factory = Arc::clone(&self.sink_factory);
                self.install(domain, settings, factory.as_ref(), InstallMode::IfAbsent)?
            }
        };

        let name = match subname {
            Some(sub) if !sub.is_empty() => format!("{}.{}", domain, sub),
            _ => domain.to_string(),
        };
        Ok(DomainLogger::new(slot, name))
    }

    /// Drain, flush and close everything `domain` owns
    ///
    /// Every sink is closed even when some fail; the failures are collected in
    /// the report. Calling this again returns the same terminal status with
    /// no errors.
    pub fn shutdown(&self, domain: &str) -> ShutdownReport {
        let Some(slot) = self.lookup(domain) else {
            return ShutdownReport::new(domain, DomainStatus::Unconfigured);
        };

        let mut state = slot.state.write();
        let mut report = ShutdownReport::new(domain, DomainStatus::Shutdown);
        if state.status == DomainStatus::Shutdown {
            report.already_shut_down = true;
            return report;
        }

        let (stop, close_errors) = self.retire(domain, &state.pipeline);
        state.status = DomainStatus::Shutdown;

        report.dropped_on_stop = stop.dropped;
        report.timed_out = stop.timed_out;
        report.close_errors = close_errors;
        report
    }

    /// Shut down every domain, in name order
    pub fn shutdown_all(&self) -> Vec<ShutdownReport> {
        self.domains()
            .iter()
            .map(|domain| self.shutdown(domain))
            .collect()
    }

    pub fn status(&self, domain: &str) -> DomainStatus {
        self.lookup(domain)
            .map_or(DomainStatus::Unconfigured, |slot| slot.status())
    }

    /// Settings the domain is currently configured with
    pub fn settings(&self, domain: &str) -> Option<Settings> {
        self.lookup(domain)
            .map(|slot| slot.state.read().settings.clone())
    }

    /// Snapshot of the domain's current pipeline counters
    ///
    /// Counters start from zero after every `configure`.
    pub fn metrics(&self, domain: &str) -> Option<PipelineMetrics> {
        self.lookup(domain)
            .map(|slot| slot.state.read().pipeline.metrics().clone())
    }

    /// Names of every known domain, sorted
    pub fn domains(&self) -> Vec<String> {
        let mut names: Vec<String> = self.domains.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lookup(&self, domain: &str) -> Option<Arc<DomainSlot>> {
        self.domains.lock().get(domain).cloned()
    }

    fn install(
        &self,
        domain: &str,
        settings: Settings,
        factory: &dyn SinkFactory,
        mode: InstallMode,
    ) -> Result<Arc<DomainSlot>> {
        if domain.trim().is_empty() {
            return Err(LoggerError::config(
                "DomainManager",
                "domain name must not be empty",
            ));
        }
        settings.validate()?;

        if let Some(slot) = self.lookup(domain) {
            if mode == InstallMode::Replace {
                self.replace(&slot, settings, factory)?;
            }
            return Ok(slot);
        }

        let sinks = factory.build(&settings)?;
        let pipeline = self.build_pipeline(domain, &settings, sinks)?;

        let existing = {
            let mut domains = self.domains.lock();
            match domains.get(domain) {
                Some(slot) => Arc::clone(slot),
                None => {
                    let slot = Arc::new(DomainSlot {
                        name: domain.to_string(),
                        state: RwLock::new(DomainState {
                            settings,
                            pipeline,
                            status: DomainStatus::Configured,
                        }),
                    });
                    domains.insert(domain.to_string(), Arc::clone(&slot));
                    return Ok(slot);
                }
            }
        };

        // Another thread created the domain first
        self.retire(domain, &pipeline);
        if mode == InstallMode::Replace {
            self.replace(&existing, settings, factory)?;
        }
        Ok(existing)
    }

    /// Swap in a new configuration under the domain's write lock
    ///
    /// The old pipeline is drained before the factory runs, so a file shared
    /// by the old and new sinks is never rotated by the old sink once the new
    /// one has opened it. Old sinks are closed only after the new ones were
    /// built; when building fails they keep receiving records.
    fn replace(&self, slot: &DomainSlot, settings: Settings, factory: &dyn SinkFactory) -> Result<()> {
        let domain = slot.name();
        let mut state = slot.state.write();
        let was_live = state.status != DomainStatus::Shutdown;
        if was_live {
            state.pipeline.stop(self.shutdown_timeout);
        }

        let built = factory
            .build(&settings)
            .and_then(|sinks| self.build_pipeline(domain, &settings, sinks));
        let pipeline = match built {
            Ok(pipeline) => pipeline,
            Err(e) => {
                if was_live {
                    let sinks = state.pipeline.dispatcher().sinks().to_vec();
                    let resumed = self.build_pipeline(domain, &state.settings, sinks);
                    match resumed {
                        Ok(resumed) => state.pipeline = resumed,
                        // build_pipeline already closed the old sinks
                        Err(_) => state.status = DomainStatus::Shutdown,
                    }
                }
                return Err(e);
            }
        };

        if was_live {
            close_sinks(domain, state.pipeline.dispatcher().sinks(), self.reporter.as_ref());
        }
        *state = DomainState {
            settings,
            pipeline,
            status: DomainStatus::Configured,
        };
        Ok(())
    }

    fn build_pipeline(
        &self,
        domain: &str,
        settings: &Settings,
        sinks: SinkList,
    ) -> Result<DispatchPipeline> {
        let dispatcher = Dispatcher::new(
            domain,
            formatter_for(settings),
            sinks,
            Arc::clone(&self.reporter),
        );

        if !settings.use_async {
            return Ok(DispatchPipeline::inline(dispatcher));
        }

        let pipeline = DispatchPipeline::queued(
            dispatcher,
            settings.max_queue_size,
            settings.overflow_policy,
            self.on_overflow.clone(),
        );
        if let Err(e) = pipeline.start() {
            close_sinks(domain, pipeline.dispatcher().sinks(), self.reporter.as_ref());
            return Err(e);
        }
        Ok(pipeline)
    }

    /// Stop a pipeline and close its sinks
    fn retire(
        &self,
        domain: &str,
        pipeline: &DispatchPipeline,
    ) -> (crate::core::StopReport, Vec<String>) {
        let stop = pipeline.stop(self.shutdown_timeout);
        let errors = close_sinks(domain, pipeline.dispatcher().sinks(), self.reporter.as_ref());
        (stop, errors)
    }
}

impl Default for DomainManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DomainManager {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

/// Close every sink, collecting failures without stopping at the first
fn close_sinks(
    domain: &str,
    sinks: &[Arc<dyn crate::core::Sink>],
    reporter: &dyn FallbackReporter,
) -> Vec<String> {
    let mut errors = Vec::new();

    for sink in sinks {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.close()));
        let error = match result {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(_) => LoggerError::sink_write(sink.name(), "panicked while closing"),
        };
        reporter.report(&DeliveryFailure::SinkClose {
            domain,
            sink: sink.name(),
            error: &error,
        });
        errors.push(format!("{}: {}", sink.name(), error));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Sink, WriteOutcome};
    use crate::sinks::MemorySink;

    fn capture_factory(sink: &Arc<MemorySink>) -> impl SinkFactory + 'static {
        let sink = Arc::clone(sink);
        move |_: &Settings| -> Result<SinkList> { Ok(vec![sink.clone() as Arc<dyn Sink>]) }
    }

    struct CloseFails;

    impl Sink for CloseFails {
        fn write(&self, _bytes: &[u8], _level: LogLevel) -> Result<WriteOutcome> {
            Ok(WriteOutcome::Written)
        }

        fn close(&self) -> Result<()> {
            Err(LoggerError::sink_write("close_fails", "handle already gone"))
        }

        fn name(&self) -> &str {
            "close_fails"
        }
    }

    #[test]
    fn test_empty_domain_name_is_rejected() {
        let manager = DomainManager::new();
        let err = manager.configure("  ", Settings::default()).unwrap_err();
        assert!(err.is_configuration());
        assert!(manager.domains().is_empty());
    }

    #[test]
    fn test_invalid_settings_leave_state_untouched() {
        let manager = DomainManager::new();
        let sink = Arc::new(MemorySink::new());
        manager
            .configure_with("api", Settings::default().with_use_async(false), capture_factory(&sink))
            .unwrap();

        let bad = Settings::default().with_max_queue_size(0);
        assert!(manager.configure("api", bad).unwrap_err().is_configuration());

        assert_eq!(manager.status("api"), DomainStatus::Configured);
        assert_eq!(manager.settings("api").unwrap().max_queue_size, 1000);
        manager.get_logger("api", None).unwrap().info("still here");
        assert_eq!(sink.write_count(), 1);
    }

    #[test]
    fn test_factory_failure_leaves_state_untouched() {
        let manager = DomainManager::new();
        let sink = Arc::new(MemorySink::new());
        manager
            .configure_with("api", Settings::default(), capture_factory(&sink))
            .unwrap();

        let result = manager.configure_with("api", Settings::default(), |_: &Settings| -> Result<SinkList> {
            Err(LoggerError::file_sink("/nope/app.log", "permission denied"))
        });
        assert!(result.is_err());
        assert!(!sink.is_closed());
        assert_eq!(manager.status("api"), DomainStatus::Configured);

        manager.get_logger("api", None).unwrap().info("old sinks keep working");
        manager.shutdown("api");
        assert_eq!(sink.lines().len(), 1);
        assert!(sink.is_closed());
    }

    #[test]
    fn test_reconfigure_drains_old_pipeline_before_building() {
        let manager = DomainManager::new();
        let old = Arc::new(MemorySink::new());
        manager
            .configure_with("api", Settings::default(), capture_factory(&old))
            .unwrap();
        let logger = manager.get_logger("api", None).unwrap();
        for i in 0..50 {
            logger.info(format!("R{}", i));
        }

        let seen = Arc::new(Mutex::new(None));
        let observed = Arc::clone(&seen);
        let drained = Arc::clone(&old);
        manager
            .configure_with("api", Settings::default(), move |_: &Settings| -> Result<SinkList> {
                *observed.lock() = Some((drained.write_count(), drained.is_closed()));
                Ok(vec![Arc::new(MemorySink::new()) as Arc<dyn Sink>])
            })
            .unwrap();

        assert_eq!(*seen.lock(), Some((50, false)));
        assert!(old.is_closed());
    }

    #[test]
    fn test_get_logger_auto_configures() {
        let manager = DomainManager::new();
        assert_eq!(manager.status("worker"), DomainStatus::Unconfigured);

        let logger = manager.get_logger("worker", Some("jobs")).unwrap();
        assert_eq!(logger.name(), "worker.jobs");
        assert_eq!(logger.domain(), "worker");
        assert_eq!(manager.status("worker"), DomainStatus::Configured);
        assert_eq!(manager.settings("worker").unwrap().name, "worker");
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let manager = DomainManager::new();
        let sink = Arc::new(MemorySink::new());
        manager
            .configure_with("api", Settings::default(), capture_factory(&sink))
            .unwrap();

        let first = manager.shutdown("api");
        assert_eq!(first.status, DomainStatus::Shutdown);
        assert!(!first.already_shut_down);
        assert!(first.is_clean());
        assert!(sink.is_closed());

        let second = manager.shutdown("api");
        assert_eq!(second.status, DomainStatus::Shutdown);
        assert!(second.already_shut_down);
        assert!(second.into_result().is_ok());
    }

    #[test]
    fn test_shutdown_unknown_domain() {
        let manager = DomainManager::new();
        let report = manager.shutdown("ghost");
        assert_eq!(report.status, DomainStatus::Unconfigured);
        assert!(manager.domains().is_empty());
    }

    #[test]
    fn test_shutdown_collects_close_errors() {
        let manager = DomainManager::new();
        let good = Arc::new(MemorySink::new());
        let kept = Arc::clone(&good);
        manager
            .configure_with("api", Settings::default(), move |_: &Settings| -> Result<SinkList> {
                Ok(vec![
                    Arc::new(CloseFails) as Arc<dyn Sink>,
                    kept.clone() as Arc<dyn Sink>,
                ])
            })
            .unwrap();

        let report = manager.shutdown("api");
        assert_eq!(report.close_errors.len(), 1);
        assert!(good.is_closed());

        match report.into_result() {
            Err(LoggerError::Shutdown { domain, failures }) => {
                assert_eq!(domain, "api");
                assert!(failures[0].contains("close_fails"));
            }
            other => panic!("expected shutdown error, got {:?}", other),
        }
    }

    #[test]
    fn test_reconfigure_closes_old_sinks_first() {
        let manager = DomainManager::new();
        let old = Arc::new(MemorySink::new());
        let new = Arc::new(MemorySink::new());

        manager
            .configure_with("api", Settings::default(), capture_factory(&old))
            .unwrap();
        let logger = manager.get_logger("api", None).unwrap();
        logger.info("before");

        manager
            .configure_with("api", Settings::default(), capture_factory(&new))
            .unwrap();
        logger.info("after");
        manager.shutdown("api");

        assert!(old.is_closed());
        assert_eq!(old.write_count(), 1);
        assert_eq!(new.write_count(), 1);
        assert!(new.contents().contains("after"));
    }

    #[test]
    fn test_configure_after_shutdown_revives_domain() {
        let manager = DomainManager::new();
        let sink = Arc::new(MemorySink::new());
        manager.configure("api", Settings::default()).unwrap();
        manager.shutdown("api");

        manager
            .configure_with("api", Settings::default().with_use_async(false), capture_factory(&sink))
            .unwrap();
        assert_eq!(manager.status("api"), DomainStatus::Configured);

        manager.get_logger("api", None).unwrap().warning("back");
        assert_eq!(sink.write_count(), 1);
    }

    #[test]
    fn test_logging_after_shutdown_is_counted() {
        let manager = DomainManager::new();
        let sink = Arc::new(MemorySink::new());
        manager
            .configure_with("api", Settings::default(), capture_factory(&sink))
            .unwrap();
        let logger = manager.get_logger("api", None).unwrap();
        manager.shutdown("api");

        logger.error("too late");
        assert_eq!(sink.write_count(), 0);
        assert_eq!(manager.metrics("api").unwrap().rejected_after_stop(), 1);
    }

    #[test]
    fn test_configure_named_uses_settings_name() {
        let manager = DomainManager::new();
        manager
            .configure_named(Settings::default().with_name("billing"))
            .unwrap();
        assert_eq!(manager.domains(), vec!["billing".to_string()]);

        assert!(manager.configure_named(Settings::default()).is_err());
    }

    #[test]
    fn test_shutdown_all_and_drop() {
        let sink = Arc::new(MemorySink::new());
        let late = Arc::new(MemorySink::new());
        {
            let manager = DomainManager::builder()
                .sink_factory(capture_factory(&sink))
                .build();
            manager.configure("a", Settings::default()).unwrap();
            manager.configure("b", Settings::default()).unwrap();

            let reports = manager.shutdown_all();
            let names: Vec<&str> = reports.iter().map(|r| r.domain.as_str()).collect();
            assert_eq!(names, vec!["a", "b"]);
            assert!(sink.is_closed());

            manager
                .configure_with("c", Settings::default(), capture_factory(&late))
                .unwrap();
            assert!(!late.is_closed());
        }
        // Dropping the manager shut down "c" as well
        assert!(late.is_closed());
    }
}
