//! Integration tests for the domain manager
//!
//! These tests verify:
//! - Per-domain FIFO delivery
//! - Isolation between differently formatted domains
//! - Rotation bounds on disk
//! - Overflow accounting with a stalled worker
//! - Level filtering and failing-sink isolation
//! - Idempotent shutdown and handle release

use crossbeam_channel::{bounded, Receiver, Sender};
use domain_logger::core::{DeliveryFailure, FallbackReporter, LogLevel, Settings, Sink, WriteOutcome};
use domain_logger::manager::{DefaultSinkFactory, DomainManager, DomainStatus, SinkFactory, SinkList};
use domain_logger::sinks::{MemorySink, RotatingFileSink};
use domain_logger::{LoggerError, Result};
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn capture(sink: &Arc<MemorySink>) -> impl SinkFactory + 'static {
    let sink = Arc::clone(sink);
    move |_: &Settings| -> Result<SinkList> { Ok(vec![sink.clone() as Arc<dyn Sink>]) }
}

#[derive(Default)]
struct CollectingReporter {
    failures: Mutex<Vec<String>>,
}

impl FallbackReporter for CollectingReporter {
    fn report(&self, failure: &DeliveryFailure<'_>) {
        self.failures.lock().push(failure.to_string());
    }
}

/// Blocks every write until the release channel is dropped
struct GatedSink {
    entered: Sender<()>,
    release: Receiver<()>,
    written: MemorySink,
}

impl Sink for GatedSink {
    fn write(&self, bytes: &[u8], level: LogLevel) -> Result<WriteOutcome> {
        let _ = self.entered.try_send(());
        let _ = self.release.recv();
        self.written.write(bytes, level)
    }

    fn name(&self) -> &str {
        "gated"
    }
}

struct BrokenSink;

impl Sink for BrokenSink {
    fn write(&self, _bytes: &[u8], _level: LogLevel) -> Result<WriteOutcome> {
        Err(LoggerError::sink_write("broken", "device unplugged"))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Sleeps on every write so the queue backs up
struct SlowSink {
    delay: Duration,
}

impl Sink for SlowSink {
    fn write(&self, _bytes: &[u8], _level: LogLevel) -> Result<WriteOutcome> {
        std::thread::sleep(self.delay);
        Ok(WriteOutcome::Written)
    }

    fn name(&self) -> &str {
        "slow"
    }
}

fn log_files(dir: &Path, prefix: &str) -> Vec<std::path::PathBuf> {
    fs::read_dir(dir)
        .expect("Failed to read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect()
}

#[test]
fn test_fifo_order_single_producer() {
    let manager = DomainManager::new();
    let sink = Arc::new(MemorySink::new());
    manager
        .configure_with(
            "api",
            Settings::default().with_format("%(message)s"),
            capture(&sink),
        )
        .unwrap();

    let logger = manager.get_logger("api", None).unwrap();
    for i in 0..1000 {
        logger.info(format!("R{}", i));
    }
    let report = manager.shutdown("api");

    assert!(report.is_clean());
    let expected: Vec<String> = (0..1000).map(|i| format!("R{}", i)).collect();
    assert_eq!(sink.lines(), expected);
}

#[test]
fn test_shutdown_is_idempotent() {
    let manager = DomainManager::new();
    manager.configure("api", Settings::default()).unwrap();

    let first = manager.shutdown("api");
    let second = manager.shutdown("api");

    assert_eq!(first.status, DomainStatus::Shutdown);
    assert_eq!(second.status, first.status);
    assert!(second.already_shut_down);
    assert!(second.close_errors.is_empty());
    assert_eq!(manager.status("api"), DomainStatus::Shutdown);
}

#[test]
fn test_json_and_text_domains_are_isolated() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = DomainManager::new();

    manager
        .configure(
            "api",
            Settings::default()
                .with_json(true)
                .with_file(temp_dir.path(), "api.log"),
        )
        .unwrap();
    manager
        .configure(
            "core",
            Settings::default().with_file(temp_dir.path(), "core.log"),
        )
        .unwrap();

    let api = manager.get_logger("api", None).unwrap();
    let core = manager.get_logger("core", None).unwrap();
    api.info("from api");
    core.info("from core");

    // Reconfiguring core must not change how api renders
    manager
        .configure(
            "core",
            Settings::default()
                .with_format("%(levelname)s|%(message)s")
                .with_file(temp_dir.path(), "core.log"),
        )
        .unwrap();
    api.info("api again");
    core.info("core again");
    manager.shutdown_all();

    let api_content = fs::read_to_string(temp_dir.path().join("api.log")).unwrap();
    let api_lines: Vec<&str> = api_content.lines().collect();
    assert_eq!(api_lines.len(), 2);
    for line in &api_lines {
        let value: serde_json::Value = serde_json::from_str(line).expect("api writes JSON");
        assert_eq!(value["logger"], "api");
        assert_eq!(value["level"], "INFO");
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(value.get("context").is_none());
    }

    let core_content = fs::read_to_string(temp_dir.path().join("core.log")).unwrap();
    let core_lines: Vec<&str> = core_content.lines().collect();
    assert_eq!(core_lines.len(), 2);
    assert!(core_lines[0].ends_with(" - core - INFO - from core"));
    assert_eq!(core_lines[1], "INFO|core again");
    assert!(!core_content.contains("from api"));
}

#[test]
fn test_rotation_keeps_files_bounded() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = DomainManager::new();
    manager
        .configure(
            "core",
            Settings::default()
                .with_format("%(message)s")
                .with_file(temp_dir.path(), "core.log")
                .with_max_bytes(100)
                .with_backup_count(2),
        )
        .unwrap();

    let logger = manager.get_logger("core", None).unwrap();
    // 40 records of 16 bytes each
    for i in 0..40 {
        logger.info(format!("rotating #{:05}", i));
    }
    manager.shutdown("core");

    let files = log_files(temp_dir.path(), "core.log");
    assert_eq!(files.len(), 3, "active file plus two backups: {:?}", files);
    for file in &files {
        let size = fs::metadata(file).unwrap().len();
        assert!(size <= 100 + 16, "{} has {} bytes", file.display(), size);
    }

    let active = fs::read_to_string(temp_dir.path().join("core.log")).unwrap();
    assert!(active.contains("rotating #00039"));
}

#[test]
fn test_overflow_with_stalled_worker() {
    let (entered_tx, entered_rx) = bounded(16);
    let (release_tx, release_rx) = bounded::<()>(0);
    let gated = Arc::new(GatedSink {
        entered: entered_tx,
        release: release_rx,
        written: MemorySink::new(),
    });
    let target = Arc::clone(&gated);

    let manager = DomainManager::new();
    manager
        .configure_with(
            "api",
            Settings::default()
                .with_max_queue_size(5)
                .with_format("%(message)s"),
            move |_: &Settings| -> Result<SinkList> { Ok(vec![target.clone() as Arc<dyn Sink>]) },
        )
        .unwrap();
    let logger = manager.get_logger("api", None).unwrap();

    // The worker takes R0 and stalls inside the sink
    logger.info("R0");
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("worker never reached the sink");

    for i in 1..=5 {
        logger.info(format!("R{}", i));
    }
    logger.info("R6");

    let metrics = manager.metrics("api").unwrap();
    assert_eq!(metrics.overflow_dropped(), 1);
    assert_eq!(metrics.enqueued(), 6);

    drop(release_tx);
    let report = manager.shutdown("api");
    assert_eq!(report.dropped_on_stop, 0);
    assert_eq!(gated.written.lines(), vec!["R0", "R1", "R2", "R3", "R4", "R5"]);
}

#[test]
fn test_level_filtering_per_sink() {
    let manager = DomainManager::new();
    let everything = Arc::new(MemorySink::new().with_name("everything"));
    let errors_only = Arc::new(MemorySink::new().with_name("errors").with_threshold(LogLevel::Error));
    let (a, b) = (Arc::clone(&everything), Arc::clone(&errors_only));
    manager
        .configure_with(
            "api",
            Settings::default().with_use_async(false),
            move |_: &Settings| -> Result<SinkList> {
                Ok(vec![a.clone() as Arc<dyn Sink>, b.clone() as Arc<dyn Sink>])
            },
        )
        .unwrap();
    let logger = manager.get_logger("api", None).unwrap();

    logger.debug("below the domain level");
    assert_eq!(everything.write_count(), 0);
    assert_eq!(errors_only.write_count(), 0);

    logger.warning("one eligible sink");
    assert_eq!(everything.write_count(), 1);
    assert_eq!(errors_only.write_count(), 0);

    logger.critical("both sinks");
    assert_eq!(everything.write_count(), 2);
    assert_eq!(errors_only.write_count(), 1);
}

#[test]
fn test_failing_sink_is_isolated_and_reported() {
    let reporter = Arc::new(CollectingReporter::default());
    let manager = DomainManager::builder()
        .reporter(reporter.clone())
        .build();

    let good = Arc::new(MemorySink::new());
    let target = Arc::clone(&good);
    manager
        .configure_with(
            "api",
            Settings::default().with_format("%(message)s"),
            move |_: &Settings| -> Result<SinkList> {
                Ok(vec![Arc::new(BrokenSink) as Arc<dyn Sink>, target.clone() as Arc<dyn Sink>])
            },
        )
        .unwrap();

    let logger = manager.get_logger("api", None).unwrap();
    logger.info("first");
    logger.error("second");
    manager.shutdown("api");

    assert_eq!(good.lines(), vec!["first", "second"]);
    let metrics = manager.metrics("api").unwrap();
    assert_eq!(metrics.sink_failures(), 2);

    let failures = reporter.failures.lock();
    assert_eq!(failures.len(), 2);
    assert!(failures[0].contains("[api] sink 'broken' failed"));
    assert!(failures[0].contains("device unplugged"));
}

#[test]
fn test_chained_factory_keeps_default_sinks() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let extra = Arc::new(MemorySink::new());
    let manager = DomainManager::builder()
        .sink_factory(DefaultSinkFactory.chain(capture(&extra)))
        .build();

    manager
        .configure(
            "api",
            Settings::default()
                .with_format("%(message)s")
                .with_file(temp_dir.path(), "api.log"),
        )
        .unwrap();
    manager.get_logger("api", None).unwrap().info("everywhere");
    manager.shutdown("api");

    assert_eq!(extra.lines(), vec!["everywhere"]);
    let file = fs::read_to_string(temp_dir.path().join("api.log")).unwrap();
    assert_eq!(file, "everywhere\n");
}

#[test]
fn test_settings_from_environment_names() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dir = temp_dir.path().to_string_lossy().into_owned();
    let settings = Settings::from_vars(vec![
        ("LOG_NAME".to_string(), "billing".to_string()),
        ("LOG_LEVEL".to_string(), "warning".to_string()),
        ("LOG_JSON".to_string(), "1".to_string()),
        ("LOG_DIR".to_string(), dir),
        ("LOG_FILE".to_string(), "billing.log".to_string()),
        ("LOG_BACKUP_FILES_COUNT".to_string(), "3".to_string()),
    ])
    .unwrap();

    let manager = DomainManager::new();
    manager.configure_named(settings).unwrap();

    let active = manager.settings("billing").unwrap();
    assert_eq!(active.level, LogLevel::Warning);
    assert!(active.json);
    assert_eq!(active.backup_count, 3);

    let logger = manager.get_logger("billing", None).unwrap();
    logger.info("filtered");
    logger.error("kept");
    manager.shutdown("billing");

    let content = fs::read_to_string(temp_dir.path().join("billing.log")).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("\"message\":\"kept\""));
}

#[test]
fn test_shutdown_releases_file_handles() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_path = temp_dir.path().join("logs").join("app.log");
    let created: Arc<Mutex<Vec<Arc<RotatingFileSink>>>> = Arc::default();
    let registry = Arc::clone(&created);

    let manager = DomainManager::new();
    manager
        .configure_with(
            "app",
            Settings::default(),
            move |_: &Settings| -> Result<SinkList> {
                let sink = Arc::new(RotatingFileSink::new(&log_path, 1024, 1)?);
                registry.lock().push(Arc::clone(&sink));
                Ok(vec![sink as Arc<dyn Sink>])
            },
        )
        .unwrap();
    manager.get_logger("app", None).unwrap().info("bye");
    manager.shutdown("app");

    for sink in created.lock().iter() {
        assert!(sink.is_closed());
    }
    fs::remove_dir_all(temp_dir.path().join("logs")).expect("log dir still in use");
}

#[test]
fn test_unwritable_log_dir_fails_configure() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let not_a_dir = temp_dir.path().join("plain_file");
    fs::write(&not_a_dir, "occupied").unwrap();

    let manager = DomainManager::new();
    let result = manager.configure(
        "api",
        Settings::default().with_file(not_a_dir.join("nested"), "api.log"),
    );

    assert!(result.is_err());
    assert_eq!(manager.status("api"), DomainStatus::Unconfigured);
}

#[test]
fn test_log_injection_prevention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = DomainManager::new();
    manager
        .configure(
            "api",
            Settings::default()
                .with_use_async(false)
                .with_file(temp_dir.path(), "injection.log"),
        )
        .unwrap();

    let logger = manager.get_logger("api", None).unwrap();
    logger.info("User login\nERROR [2024-10-17] Fake error injected\r\tINFO Continuation");

    // Sync domains write through; no shutdown needed to read the file
    let content = fs::read_to_string(temp_dir.path().join("injection.log")).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("User login\\nERROR [2024-10-17] Fake error injected\\r\\tINFO"));
}

#[test]
fn test_shutdown_deadline_drops_remaining_records() {
    let (entered_tx, _entered_rx) = bounded(1024);
    let (_release_tx, release_rx) = bounded::<()>(0);
    let stalled = Arc::new(GatedSink {
        entered: entered_tx,
        release: release_rx,
        written: MemorySink::new(),
    });
    let target = Arc::clone(&stalled);
    let reporter = Arc::new(CollectingReporter::default());

    let manager = DomainManager::builder()
        .shutdown_timeout(Duration::from_millis(100))
        .reporter(reporter.clone())
        .build();
    manager
        .configure_with(
            "api",
            Settings::default(),
            move |_: &Settings| -> Result<SinkList> { Ok(vec![target.clone() as Arc<dyn Sink>]) },
        )
        .unwrap();

    let logger = manager.get_logger("api", None).unwrap();
    for i in 0..10 {
        logger.info(format!("R{}", i));
    }

    // Let the stalled write finish shortly after the deadline
    let release = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        drop(_release_tx);
    });
    let report = manager.shutdown("api");
    release.join().unwrap();

    assert!(report.timed_out);
    assert_eq!(report.dropped_on_stop, 9);
    assert_eq!(stalled.written.write_count(), 1);
    assert!(reporter
        .failures
        .lock()
        .iter()
        .any(|f| f.contains("9 queued records dropped")));
}

#[test]
fn test_reconfigure_onto_same_file_keeps_rotation_intact() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = Settings::default()
        .with_format("%(message)s")
        .with_file(temp_dir.path(), "app.log")
        .with_max_bytes(200)
        .with_backup_count(50);
    let factory = |settings: &Settings| -> Result<SinkList> {
        let path = settings
            .log_path()
            .ok_or_else(|| LoggerError::config("test", "log path missing"))?;
        Ok(vec![
            Arc::new(SlowSink {
                delay: Duration::from_millis(2),
            }) as Arc<dyn Sink>,
            Arc::new(RotatingFileSink::new(path, settings.max_bytes, settings.backup_count)?)
                as Arc<dyn Sink>,
        ])
    };

    let manager = DomainManager::new();
    manager.configure_with("app", settings.clone(), factory).unwrap();
    let logger = manager.get_logger("app", None).unwrap();
    // 100 records of 17 bytes each, still queued when the domain is reconfigured
    for i in 0..100 {
        logger.info(format!("backed up #{:05}", i));
    }
    manager.configure_with("app", settings, factory).unwrap();
    logger.info("NEW-AFTER-RECONFIGURE");
    manager.shutdown("app");

    let active = fs::read_to_string(temp_dir.path().join("app.log")).unwrap();
    assert!(active.contains("NEW-AFTER-RECONFIGURE"), "active file: {:?}", active);

    let mut lines = 0;
    for file in log_files(temp_dir.path(), "app.log") {
        let contents = fs::read_to_string(&file).unwrap();
        assert!(contents.len() <= 200, "{} has {} bytes", file.display(), contents.len());
        lines += contents.lines().count();
    }
    assert_eq!(lines, 101);
}
