/// Delivery of the two asynchronous notifications a scan reacts to.
///
/// # Status queries
///
/// SIGINT is routed to [`StatusBoard::request_status`] by [`crate::signals`]. The board
/// debounces triggers so that at most one line is printed per window, and it formats
/// that line without allocating so it can run inside a signal handler.
///
/// # Completion notices
///
/// Every worker posts its segment index on an mpsc channel as its final act. A
/// dedicated completion-handler thread drains those notices and reaps every worker
/// that has finished, decrementing the [`LiveWorkerCount`] once per reaped worker. The
/// handler never blocks on a join: it only joins threads that report
/// `is_finished()`, and polls again shortly when a notice arrives before its thread has
/// fully exited.
///
/// ```text
/// worker 0 ──┐ exit notice
/// worker 1 ──┼──────────────► completion handler ──► registry.reap_finished()
/// worker N ──┘                                         └─► live.decrement()
///
/// SIGINT ──► on_status_request ──► board.request_status() ──► write(stdout)
/// ```
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;
use crate::scan::partition::Segment;
use crate::signals::{StatusMaskGuard, StatusSignalGuard};

/// Maximum length of one status line, including the surrounding newlines
pub const STATUS_LINE_CAPACITY: usize = 64;

const STATUS_PREFIX: &[u8] = b"\nReceived status request. Active workers: ";

// Retry interval for notices that arrive before their thread has fully exited.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Number of workers that have not been reaped yet
#[derive(Debug)]
pub struct LiveWorkerCount {
    count: AtomicUsize,
}

impl LiveWorkerCount {
    pub fn new(workers: usize) -> Self {
        Self {
            count: AtomicUsize::new(workers),
        }
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Decrements by one. Returns `false` and leaves the count at zero if it already was.
    pub fn decrement(&self) -> bool {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Lets through at most one trigger per window
#[derive(Debug)]
pub struct Debouncer {
    window_ms: u64,
    last_fired: AtomicU64,
}

const NEVER_FIRED: u64 = u64::MAX;

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            last_fired: AtomicU64::new(NEVER_FIRED),
        }
    }

    /// Returns `true` if a trigger at `now_ms` should be acted on
    pub fn try_fire(&self, now_ms: u64) -> bool {
        let mut last = self.last_fired.load(Ordering::Acquire);
        loop {
            if last != NEVER_FIRED && now_ms.saturating_sub(last) < self.window_ms {
                return false;
            }
            match self.last_fired.compare_exchange_weak(
                last,
                now_ms,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => last = current,
            }
        }
    }
}

/// State read by the status-query handler
#[derive(Debug)]
pub struct StatusBoard {
    live: LiveWorkerCount,
    debounce: Debouncer,
    reports: AtomicU64,
}

impl StatusBoard {
    pub fn new(workers: usize, debounce_window: Duration) -> Self {
        Self {
            live: LiveWorkerCount::new(workers),
            debounce: Debouncer::new(debounce_window),
            reports: AtomicU64::new(0),
        }
    }

    pub fn live(&self) -> &LiveWorkerCount {
        &self.live
    }

    /// Number of status lines emitted so far
    pub fn reports(&self) -> u64 {
        self.reports.load(Ordering::Acquire)
    }

    /// Handles one status trigger observed at `now_ms`.
    ///
    /// Emits the status line through `emit` unless an earlier trigger fired within the
    /// debounce window. Does not allocate.
    pub fn request_status<F: FnOnce(&[u8])>(&self, now_ms: u64, emit: F) -> bool {
        if !self.debounce.try_fire(now_ms) {
            return false;
        }
        let mut buf = [0u8; STATUS_LINE_CAPACITY];
        let len = format_status_line(self.live.get(), &mut buf);
        emit(&buf[..len]);
        self.reports.fetch_add(1, Ordering::AcqRel);
        true
    }
}

fn format_status_line(live: usize, buf: &mut [u8; STATUS_LINE_CAPACITY]) -> usize {
    let mut len = STATUS_PREFIX.len();
    buf[..len].copy_from_slice(STATUS_PREFIX);

    let mut digits = [0u8; 20];
    let mut start = digits.len();
    let mut n = live;
    loop {
        start -= 1;
        digits[start] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    let digits = &digits[start..];
    buf[len..len + digits.len()].copy_from_slice(digits);
    len += digits.len();

    buf[len] = b'\n';
    len + 1
}

/// Liveness of one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Completed,
    Reaped,
}

#[derive(Debug)]
struct WorkerSlot {
    segment: Segment,
    state: WorkerState,
    handle: Option<JoinHandle<()>>,
}

impl WorkerSlot {
    /// Joins the worker and records one termination. Never joins twice.
    fn reap(&mut self, live: &LiveWorkerCount) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        if handle.join().is_err() {
            warn!(segment = self.segment.index, "worker panicked");
        }
        self.state = WorkerState::Reaped;
        if !live.decrement() {
            error!(
                segment = self.segment.index,
                "live worker count already zero at reap"
            );
        }
        true
    }
}

/// Join handles and liveness state of every spawned worker
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    slots: Mutex<Vec<WorkerSlot>>,
}

impl WorkerRegistry {
    fn slots(&self) -> MutexGuard<'_, Vec<WorkerSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, segment: Segment, handle: JoinHandle<()>) {
        self.slots().push(WorkerSlot {
            segment,
            state: WorkerState::Running,
            handle: Some(handle),
        });
    }

    /// Records that the worker for `segment` delivered or announced its exit
    pub fn mark_completed(&self, segment: usize) {
        if let Some(slot) = self
            .slots()
            .iter_mut()
            .find(|slot| slot.segment.index == segment)
        {
            if slot.state == WorkerState::Running {
                slot.state = WorkerState::Completed;
            }
        }
    }

    /// Liveness of every worker, in spawn order
    pub fn states(&self) -> Vec<WorkerState> {
        self.slots().iter().map(|slot| slot.state).collect()
    }

    /// Reaps every worker whose thread has already exited, without blocking
    pub fn reap_finished(&self, live: &LiveWorkerCount) -> usize {
        self.slots()
            .iter_mut()
            .filter(|slot| slot.handle.as_ref().is_some_and(|h| h.is_finished()))
            .map(|slot| slot.reap(live))
            .filter(|&reaped| reaped)
            .count()
    }

    /// Whether some worker announced its exit but has not been reaped yet
    fn has_pending(&self) -> bool {
        self.slots()
            .iter()
            .any(|slot| slot.state == WorkerState::Completed && slot.handle.is_some())
    }

    /// Waits for and reaps every worker not reaped yet
    pub fn reap_all(&self, live: &LiveWorkerCount) -> usize {
        self.slots()
            .iter_mut()
            .map(|slot| slot.reap(live))
            .filter(|&reaped| reaped)
            .count()
    }

    /// Gives up ownership of every unreaped worker without waiting for it
    pub(crate) fn release_all(&self) -> usize {
        self.slots()
            .iter_mut()
            .filter_map(|slot| slot.handle.take())
            .count()
    }
}

/// Both asynchronous notification paths of a running scan
pub struct SignalBridge {
    board: Arc<StatusBoard>,
    registry: Arc<WorkerRegistry>,
    metrics: ScanMetrics,
    completions: Sender<usize>,
    handler: JoinHandle<()>,
    status_guard: Option<StatusSignalGuard>,
}

impl SignalBridge {
    /// Registers both handlers for a scan with `workers` workers.
    ///
    /// Must be called before any worker is spawned. When `handle_signals` is false the
    /// status query is only reachable through [`SignalBridge::board`].
    pub fn install(
        workers: usize,
        debounce_window: Duration,
        handle_signals: bool,
        metrics: ScanMetrics,
    ) -> ScanResult<Self> {
        let board = Arc::new(StatusBoard::new(workers, debounce_window));
        let registry = Arc::new(WorkerRegistry::default());

        let status_guard = if handle_signals {
            Some(StatusSignalGuard::install(Arc::clone(&board))?)
        } else {
            None
        };

        let (completions, notices) = mpsc::channel();
        let mask = StatusMaskGuard::block()
            .map_err(|e| ScanError::signal(format!("could not mask SIGINT: {e}")))?;
        let handler = thread::Builder::new()
            .name("charscout-reaper".to_string())
            .spawn({
                let board = Arc::clone(&board);
                let registry = Arc::clone(&registry);
                let metrics = metrics.clone();
                move || run_completion_handler(notices, &registry, board.live(), &metrics)
            })
            .map_err(|e| ScanError::signal(format!("could not start completion handler: {e}")))?;
        drop(mask);

        debug!(workers, handle_signals, "signal bridge installed");

        Ok(Self {
            board,
            registry,
            metrics,
            completions,
            handler,
            status_guard,
        })
    }

    pub fn board(&self) -> &Arc<StatusBoard> {
        &self.board
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Sender a worker uses to announce its exit
    pub(crate) fn completion_sender(&self) -> Sender<usize> {
        self.completions.clone()
    }

    /// Closes the completion path and reaps every remaining worker, blocking until all
    /// have exited. Returns the number reaped here rather than by the handler.
    pub fn finish(self) -> usize {
        let Self {
            board,
            registry,
            metrics,
            completions,
            handler,
            status_guard,
        } = self;

        drop(completions);
        if handler.join().is_err() {
            warn!("completion handler panicked");
        }

        let reaped = registry.reap_all(board.live());
        metrics.record_reaped(reaped as u64);
        metrics.record_status_reports(board.reports());
        drop(status_guard);
        reaped
    }

    /// Abort path: stops reporting and releases every worker handle without joining
    pub fn abandon(self) {
        let released = self.registry.release_all();
        self.metrics.record_status_reports(self.board.reports());
        debug!(released, "signal bridge abandoned");
    }
}

fn run_completion_handler(
    notices: Receiver<usize>,
    registry: &WorkerRegistry,
    live: &LiveWorkerCount,
    metrics: &ScanMetrics,
) {
    let mut pending = false;
    loop {
        let notice = if pending {
            notices.recv_timeout(REAP_POLL_INTERVAL)
        } else {
            notices.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };

        match notice {
            Ok(segment) => {
                registry.mark_completed(segment);
                for segment in notices.try_iter() {
                    registry.mark_completed(segment);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let reaped = registry.reap_finished(live);
        metrics.record_reaped(reaped as u64);
        pending = registry.has_pending();
        trace!(reaped, live = live.get(), pending, "completion notices handled");
    }
}
