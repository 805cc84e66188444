use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::channel::{result_channel, Delivery, ResultReceiver};
use super::partition::{partition, Segment};
use super::worker::{ByteCounter, SegmentWorker, ThreadLauncher, WorkerJob, WorkerLauncher};
use crate::bridge::SignalBridge;
use crate::config::ScanConfig;
use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;
use crate::results::{PartialResult, ScanOutcome};
use crate::signals::StatusMaskGuard;

/// Stages a scan moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Partitioning,
    Spawning,
    Collecting,
    Aggregating,
    Done,
}

/// Splits a buffer across workers and gathers their counts.
///
/// Each call to [`ScanController::scan`] partitions the buffer, spawns one worker per
/// segment, waits on every result channel in segment order with a bounded timeout,
/// sums the counts and reaps every worker before returning.
pub struct ScanController {
    worker_count: usize,
    channel_timeout: Duration,
    status_debounce: Duration,
    handle_signals: bool,
    worker: Arc<dyn SegmentWorker>,
    launcher: Arc<dyn WorkerLauncher>,
    metrics: ScanMetrics,
    phase: ScanPhase,
}

impl fmt::Debug for ScanController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanController")
            .field("worker_count", &self.worker_count)
            .field("channel_timeout", &self.channel_timeout)
            .field("status_debounce", &self.status_debounce)
            .field("handle_signals", &self.handle_signals)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl ScanController {
    /// Builds a controller from validated configuration
    pub fn new(config: &ScanConfig) -> ScanResult<Self> {
        let worker_count = config.worker_count()?.get();
        Ok(Self {
            worker_count,
            channel_timeout: config.channel_timeout(),
            status_debounce: config.status_debounce(),
            handle_signals: config.handle_signals,
            worker: Arc::new(ByteCounter::with_pacing(config.worker_pacing())),
            launcher: Arc::new(ThreadLauncher),
            metrics: ScanMetrics::new(),
            phase: ScanPhase::Idle,
        })
    }

    /// Replaces the worker body run for each segment
    pub fn with_worker(mut self, worker: impl SegmentWorker) -> Self {
        self.worker = Arc::new(worker);
        self
    }

    /// Replaces how worker contexts are started
    pub fn with_launcher(mut self, launcher: impl WorkerLauncher) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Counts occurrences of `target` in `buffer` using parallel workers
    pub fn scan(&mut self, buffer: Arc<[u8]>, target: u8) -> ScanResult<ScanOutcome> {
        info!(
            "Starting scan of {} bytes for {:?} with {} workers",
            buffer.len(),
            char::from(target),
            self.worker_count
        );

        self.phase = ScanPhase::Partitioning;
        let segments = partition(buffer.len(), self.worker_count)?;
        self.metrics.record_partition(buffer.len() as u64);

        let bridge = SignalBridge::install(
            segments.len(),
            self.status_debounce,
            self.handle_signals,
            self.metrics.clone(),
        )?;

        self.phase = ScanPhase::Spawning;
        let receivers = match self.spawn_all(&bridge, &segments, &buffer, target) {
            Ok(receivers) => receivers,
            Err(e) => {
                error!("Aborting scan: {e}");
                bridge.abandon();
                return Err(e);
            }
        };

        self.phase = ScanPhase::Collecting;
        let mut outcome = ScanOutcome::new(target);
        for (segment, receiver) in receivers {
            let delivery = receiver.receive(self.channel_timeout).map_err(|source| {
                ScanError::Channel {
                    segment: segment.index,
                    source,
                }
            });

            match delivery {
                Ok(Delivery::Value(count)) => {
                    debug!(segment = segment.index, count, "segment reported");
                    bridge.registry().mark_completed(segment.index);
                    self.metrics.record_result(true);
                    outcome.add_partial(PartialResult {
                        segment,
                        count,
                        delivered: true,
                    });
                }
                Ok(Delivery::Closed { received }) => {
                    warn!(
                        segment = segment.index,
                        received, "worker exited without reporting; counting its segment as 0"
                    );
                    self.metrics.record_result(false);
                    outcome.add_lost_worker(segment, received);
                }
                Ok(Delivery::TimedOut) => {
                    let err = ScanError::ChannelTimeout {
                        segment: segment.index,
                        timeout: self.channel_timeout,
                    };
                    error!("Aborting scan: {err}");
                    bridge.abandon();
                    return Err(err);
                }
                Err(err) => {
                    error!("Aborting scan: {err}");
                    bridge.abandon();
                    return Err(err);
                }
            }
        }

        self.phase = ScanPhase::Aggregating;
        let reaped_here = bridge.finish();
        debug!(reaped_here, "all workers reaped");

        self.phase = ScanPhase::Done;
        self.metrics.log_stats();
        info!(
            "Scan complete. Found {} occurrences across {} segments",
            outcome.total,
            outcome.partials.len()
        );

        Ok(outcome)
    }

    /// Spawns one worker per segment, in segment order.
    ///
    /// SIGINT stays blocked on this thread while spawning so every worker starts with it
    /// masked. On failure the receivers created so far are dropped, closing their channels.
    fn spawn_all(
        &self,
        bridge: &SignalBridge,
        segments: &[Segment],
        buffer: &Arc<[u8]>,
        target: u8,
    ) -> ScanResult<Vec<(Segment, ResultReceiver)>> {
        let mut receivers = Vec::with_capacity(segments.len());
        let _mask = StatusMaskGuard::block()
            .map_err(|e| ScanError::signal(format!("could not mask SIGINT while spawning: {e}")))?;

        for &segment in segments {
            let (sender, receiver) = result_channel().map_err(|source| ScanError::Spawn {
                segment: segment.index,
                source,
            })?;

            let job = WorkerJob {
                segment,
                buffer: Arc::clone(buffer),
                target,
                sender,
            };
            let handle = self
                .launcher
                .launch(job, Arc::clone(&self.worker), bridge.completion_sender())
                .map_err(|source| ScanError::Spawn {
                    segment: segment.index,
                    source,
                })?;

            bridge.registry().register(segment, handle);
            self.metrics.record_spawn();
            receivers.push((segment, receiver));
        }

        Ok(receivers)
    }
}
