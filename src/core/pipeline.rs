//! Dispatch pipeline: bounded queue plus one drain worker per domain
//!
//! Producers hand records to [`DispatchPipeline::enqueue`]. In queued mode the
//! record is pushed onto a bounded crossbeam channel and a single worker thread
//! renders and writes it, so per-domain FIFO order falls out of having one
//! consumer. In inline mode there is no queue and the caller's thread does the
//! write.
//!
//! State machine (forward only): `Init -> Running -> Draining -> Stopped`.
//! An inline pipeline goes straight from `Init` to `Stopped`.

use super::{
    fallback::{DeliveryFailure, FallbackReporter},
    formatter::Formatter,
    log_record::{LogRecord, QueueEntry},
    metrics::PipelineMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy},
    sink::Sink,
    error::{LoggerError, Result},
};
use crossbeam_channel::{bounded, select, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown timeout for draining a queue (5 seconds)
///
/// Used when a pipeline is dropped without an explicit `stop`, and as the
/// manager's default drain deadline.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for the worker to finish
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Overflow alerts fire on the first drop and then every this many drops
const OVERFLOW_ALERT_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PipelineState {
    Init = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Init,
            1 => PipelineState::Running,
            2 => PipelineState::Draining,
            _ => PipelineState::Stopped,
        }
    }

    /// Whether records offered in this state are accepted
    pub fn accepts_records(&self) -> bool {
        matches!(self, PipelineState::Init | PipelineState::Running)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "INIT",
            PipelineState::Running => "RUNNING",
            PipelineState::Draining => "DRAINING",
            PipelineState::Stopped => "STOPPED",
        };
        write!(f, "{}", name)
    }
}

/// What happened to an offered record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Placed on the queue
    Queued,
    /// Written inline on the caller's thread
    Delivered,
    /// Dropped by the overflow policy and counted
    Dropped,
    /// Offered after the pipeline stopped accepting, counted
    Rejected,
}

/// Summary of a `stop` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopReport {
    /// Records still queued at the deadline, dropped and counted
    pub dropped: u64,
    /// Records the caller delivered itself because no worker was running
    pub drained_inline: u64,
    /// The worker did not finish before the deadline
    pub timed_out: bool,
    /// The pipeline was already stopped; nothing was done
    pub already_stopped: bool,
}

/// Renders a record once and writes it to every eligible sink, isolating
/// failures per sink.
pub struct Dispatcher {
    domain: String,
    formatter: Arc<dyn Formatter>,
    sinks: Vec<Arc<dyn Sink>>,
    metrics: Arc<PipelineMetrics>,
    reporter: Arc<dyn FallbackReporter>,
}

impl Dispatcher {
    pub fn new(
        domain: impl Into<String>,
        formatter: Arc<dyn Formatter>,
        sinks: Vec<Arc<dyn Sink>>,
        reporter: Arc<dyn FallbackReporter>,
    ) -> Self {
        Self {
            domain: domain.into(),
            formatter,
            sinks,
            metrics: Arc::new(PipelineMetrics::new()),
            reporter,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    pub fn formatter(&self) -> &Arc<dyn Formatter> {
        &self.formatter
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Deliver one record. Returns `true` when every eligible sink succeeded.
    ///
    /// Sink errors and panics are counted and reported to the fallback
    /// reporter; the remaining sinks still receive the record.
    pub fn deliver(&self, record: &LogRecord) -> bool {
        let mut bytes: Option<Vec<u8>> = None;
        let mut has_error = false;

        for sink in &self.sinks {
            if !sink.accepts(record.level) {
                continue;
            }
            let bytes = bytes.get_or_insert_with(|| self.formatter.render(record));

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                sink.write(bytes, record.level)
            }));

            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    has_error = true;
                    self.metrics.record_sink_failure();
                    self.reporter.report(&DeliveryFailure::SinkWrite {
                        domain: &self.domain,
                        sink: sink.name(),
                        error: &e,
                    });
                }
                Err(panic_info) => {
                    has_error = true;
                    self.metrics.record_sink_failure();
                    let message = panic_message(panic_info.as_ref());
                    self.reporter.report(&DeliveryFailure::SinkPanic {
                        domain: &self.domain,
                        sink: sink.name(),
                        message: &message,
                    });
                }
            }
        }

        if !has_error {
            self.metrics.record_delivered();
        }
        !has_error
    }

    /// Flush every open sink, reporting failures
    pub fn flush(&self) {
        for sink in &self.sinks {
            if sink.is_closed() {
                continue;
            }
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.flush()));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.reporter.report(&DeliveryFailure::SinkFlush {
                    domain: &self.domain,
                    sink: sink.name(),
                    error: &e,
                }),
                Err(panic_info) => {
                    let message = panic_message(panic_info.as_ref());
                    self.reporter.report(&DeliveryFailure::SinkPanic {
                        domain: &self.domain,
                        sink: sink.name(),
                        message: &message,
                    });
                }
            }
        }
    }

    fn report(&self, failure: &DeliveryFailure<'_>) {
        self.reporter.report(failure);
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

struct Queue {
    sender: Sender<QueueEntry>,
    receiver: Receiver<QueueEntry>,
    stop_tx: Sender<Instant>,
    stop_rx: Receiver<Instant>,
    abort: Arc<AtomicBool>,
    capacity: usize,
}

/// Per-domain delivery pipeline
///
/// # Example
///
/// ```
/// use domain_logger::core::{
///     DispatchPipeline, Dispatcher, LogLevel, LogRecord, OverflowPolicy, PipelineState,
///     StderrReporter, TextFormatter,
/// };
/// use domain_logger::sinks::MemorySink;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let sink = Arc::new(MemorySink::new());
/// let dispatcher = Dispatcher::new(
///     "api",
///     Arc::new(TextFormatter::new("%(message)s")),
///     vec![sink.clone() as Arc<dyn domain_logger::core::Sink>],
///     Arc::new(StderrReporter),
/// );
/// let pipeline = DispatchPipeline::queued(dispatcher, 100, OverflowPolicy::DropNewest, None);
/// pipeline.start().unwrap();
///
/// pipeline.enqueue(LogRecord::new("api", LogLevel::Info, "hello"));
/// pipeline.stop(Duration::from_secs(1));
///
/// assert_eq!(pipeline.state(), PipelineState::Stopped);
/// assert_eq!(sink.lines(), vec!["hello"]);
/// ```
pub struct DispatchPipeline {
    dispatcher: Arc<Dispatcher>,
    state: AtomicU8,
    queue: Option<Queue>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
}

impl DispatchPipeline {
    /// A pipeline that writes on the caller's thread
    pub fn inline(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            state: AtomicU8::new(PipelineState::Init as u8),
            queue: None,
            worker: Mutex::new(None),
            overflow_policy: OverflowPolicy::DropNewest,
            on_overflow: None,
        }
    }

    /// A pipeline with a bounded queue of `capacity` entries
    ///
    /// The drain worker is not running until [`start`](Self::start); records
    /// offered before that wait in the queue.
    pub fn queued(
        dispatcher: Dispatcher,
        capacity: usize,
        overflow_policy: OverflowPolicy,
        on_overflow: Option<OverflowCallback>,
    ) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        let (stop_tx, stop_rx) = bounded(1);

        Self {
            dispatcher: Arc::new(dispatcher),
            state: AtomicU8::new(PipelineState::Init as u8),
            queue: Some(Queue {
                sender,
                receiver,
                stop_tx,
                stop_rx,
                abort: Arc::new(AtomicBool::new(false)),
                capacity,
            }),
            worker: Mutex::new(None),
            overflow_policy,
            on_overflow,
        }
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move the state machine forward; never backwards
    fn advance(&self, to: PipelineState) -> PipelineState {
        PipelineState::from_u8(self.state.fetch_max(to as u8, Ordering::AcqRel))
    }

    pub fn is_queued(&self) -> bool {
        self.queue.is_some()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.queue.as_ref().map(|q| q.capacity)
    }

    /// Number of records waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.queue.as_ref().map_or(0, |q| q.receiver.len())
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        self.dispatcher.metrics()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    /// Spawn the drain worker. A no-op for inline pipelines and for queued
    /// pipelines that are already past `Init`.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::WorkerSpawn`] when the OS refuses a new thread.
    pub fn start(&self) -> Result<()> {
        let Some(queue) = &self.queue else {
            return Ok(());
        };

        let mut worker = self.worker.lock();
        if self.state() != PipelineState::Init || worker.is_some() {
            return Ok(());
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let entries = queue.receiver.clone();
        let stop = queue.stop_rx.clone();
        let abort = Arc::clone(&queue.abort);

        let handle = thread::Builder::new()
            .name(format!("log-drain-{}", self.dispatcher.domain()))
            .spawn(move || drain_worker(&dispatcher, &entries, &stop, &abort))
            .map_err(|e| LoggerError::worker_spawn(self.dispatcher.domain(), e.to_string()))?;

        *worker = Some(handle);
        self.advance(PipelineState::Running);
        Ok(())
    }

    /// Offer a record. Never blocks longer than the overflow policy allows
    /// and never returns an error; every non-delivery is counted.
    pub fn enqueue(&self, record: LogRecord) -> EnqueueOutcome {
        let metrics = self.dispatcher.metrics();

        if !self.state().accepts_records() {
            metrics.record_rejected_after_stop();
            return EnqueueOutcome::Rejected;
        }

        let Some(queue) = &self.queue else {
            metrics.record_enqueued();
            self.dispatcher.deliver(&record);
            self.dispatcher.flush();
            return EnqueueOutcome::Delivered;
        };

        match queue.sender.try_send(QueueEntry::new(record)) {
            Ok(()) => {
                metrics.record_enqueued();
                EnqueueOutcome::Queued
            }
            Err(TrySendError::Full(entry)) => self.handle_overflow(queue, entry),
            Err(TrySendError::Disconnected(_)) => {
                metrics.record_rejected_after_stop();
                EnqueueOutcome::Rejected
            }
        }
    }

    fn handle_overflow(&self, queue: &Queue, entry: QueueEntry) -> EnqueueOutcome {
        match self.overflow_policy {
            OverflowPolicy::DropNewest => self.alert_and_drop(),
            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.dispatcher.metrics().record_block();
                match queue.sender.send_timeout(entry, timeout) {
                    Ok(()) => {
                        self.dispatcher.metrics().record_enqueued();
                        EnqueueOutcome::Queued
                    }
                    Err(SendTimeoutError::Timeout(_)) => self.alert_and_drop(),
                    Err(SendTimeoutError::Disconnected(_)) => {
                        self.dispatcher.metrics().record_rejected_after_stop();
                        EnqueueOutcome::Rejected
                    }
                }
            }
        }
    }

    /// Count a dropped record, alerting on the first drop and periodically after
    fn alert_and_drop(&self) -> EnqueueOutcome {
        let dropped_total = self.dispatcher.metrics().record_overflow() + 1;

        if dropped_total == 1 || dropped_total % OVERFLOW_ALERT_INTERVAL == 0 {
            self.dispatcher.report(&DeliveryFailure::QueueOverflow {
                domain: self.dispatcher.domain(),
                dropped_total,
            });
            if let Some(ref callback) = self.on_overflow {
                callback(dropped_total);
            }
        }

        EnqueueOutcome::Dropped
    }

    /// Stop accepting records, drain what is queued within `timeout`, and
    /// flush the sinks. Sinks are not closed here.
    ///
    /// The worker finishes the write in progress before it observes the stop,
    /// so this call returns only after no write is running. Records still
    /// queued when the deadline passes are dropped and counted. Concurrent
    /// callers are serialized; all but the first get `already_stopped`.
    pub fn stop(&self, timeout: Duration) -> StopReport {
        // Held for the whole call: a concurrent `stop` waits here and then
        // finds the pipeline stopped instead of draining alongside the worker
        let mut worker = self.worker.lock();
        if self.state() == PipelineState::Stopped {
            return StopReport {
                already_stopped: true,
                ..StopReport::default()
            };
        }

        let Some(queue) = &self.queue else {
            self.advance(PipelineState::Stopped);
            return StopReport::default();
        };

        self.advance(PipelineState::Draining);
        let deadline = Instant::now() + timeout;
        let mut report = StopReport::default();

        match worker.take() {
            Some(handle) => {
                let _ = queue.stop_tx.try_send(deadline);

                while !handle.is_finished() {
                    if Instant::now() >= deadline {
                        report.timed_out = true;
                        queue.abort.store(true, Ordering::Release);
                        break;
                    }
                    thread::sleep(JOIN_POLL_INTERVAL);
                }

                // After an abort the worker exits once its in-flight write returns
                if let Err(panic_info) = handle.join() {
                    let message = panic_message(panic_info.as_ref());
                    self.dispatcher.report(&DeliveryFailure::SinkPanic {
                        domain: self.dispatcher.domain(),
                        sink: "drain-worker",
                        message: &message,
                    });
                }
            }
            None => {
                // Never started: deliver what is queued on this thread
                while Instant::now() < deadline {
                    match queue.receiver.try_recv() {
                        Ok(entry) => {
                            self.dispatcher.deliver(&entry.record);
                            report.drained_inline += 1;
                        }
                        Err(_) => break,
                    }
                }
            }
        }

        while queue.receiver.try_recv().is_ok() {
            report.dropped += 1;
        }
        if report.dropped > 0 {
            self.dispatcher.metrics().record_dropped_on_stop(report.dropped);
            self.dispatcher.report(&DeliveryFailure::StopTimeout {
                domain: self.dispatcher.domain(),
                dropped: report.dropped,
            });
        }

        self.dispatcher.flush();
        self.advance(PipelineState::Stopped);
        report
    }
}

impl Drop for DispatchPipeline {
    fn drop(&mut self) {
        if self.state() != PipelineState::Stopped {
            self.stop(DEFAULT_SHUTDOWN_TIMEOUT);
        }
    }
}

/// Body of the drain worker thread
///
/// Blocks on the entry queue and the stop signal. On stop it keeps draining
/// until the queue is empty or the deadline passes. The abort flag is checked
/// between entries, never during a write.
fn drain_worker(
    dispatcher: &Dispatcher,
    entries: &Receiver<QueueEntry>,
    stop: &Receiver<Instant>,
    abort: &AtomicBool,
) {
    loop {
        select! {
            recv(entries) -> msg => match msg {
                Ok(entry) => {
                    dispatcher.deliver(&entry.record);
                    if entries.is_empty() {
                        dispatcher.flush();
                    }
                    if abort.load(Ordering::Acquire) {
                        return;
                    }
                }
                Err(_) => return,
            },
            recv(stop) -> msg => {
                let deadline = msg.ok();
                drain_remaining(dispatcher, entries, deadline, abort);
                return;
            }
        }
    }
}

fn drain_remaining(
    dispatcher: &Dispatcher,
    entries: &Receiver<QueueEntry>,
    deadline: Option<Instant>,
    abort: &AtomicBool,
) {
    loop {
        if abort.load(Ordering::Acquire) || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        match entries.try_recv() {
            Ok(entry) => {
                dispatcher.deliver(&entry.record);
            }
            Err(_) => break,
        }
    }
    dispatcher.flush();
}
