use std::fmt;
use std::io;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, trace};

use super::channel::ResultSender;
use super::partition::Segment;
use crate::errors::{ScanError, ScanResult};

/// Counts occurrences of `target` in `haystack`
pub fn count_byte(haystack: &[u8], target: u8) -> i64 {
    haystack.iter().filter(|&&b| b == target).count() as i64
}

/// Everything a worker needs to scan one segment and report back
pub struct WorkerJob {
    pub segment: Segment,
    pub buffer: Arc<[u8]>,
    pub target: u8,
    pub sender: ResultSender,
}

impl WorkerJob {
    /// Read-only view of the bytes this worker owns
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[self.segment.range()]
    }
}

impl fmt::Debug for WorkerJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerJob")
            .field("segment", &self.segment)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// The body run inside each worker context.
///
/// Implementations must report through `job.sender` at most once. Returning without
/// sending closes the channel, which the controller records as a lost worker.
pub trait SegmentWorker: Send + Sync + 'static {
    fn run(&self, job: WorkerJob) -> ScanResult<()>;
}

/// The production worker: a linear scan for one byte value
#[derive(Debug, Clone, Default)]
pub struct ByteCounter {
    pacing: Option<Duration>,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` after every byte so long scans can be observed
    pub fn with_pacing(delay: Duration) -> Self {
        Self {
            pacing: (!delay.is_zero()).then_some(delay),
        }
    }
}

impl SegmentWorker for ByteCounter {
    fn run(&self, job: WorkerJob) -> ScanResult<()> {
        let count = match self.pacing {
            None => count_byte(job.bytes(), job.target),
            Some(delay) => job.bytes().iter().fold(0i64, |count, &b| {
                thread::sleep(delay);
                count + i64::from(b == job.target)
            }),
        };

        let segment = job.segment.index;
        job.sender
            .send(count)
            .map_err(|source| ScanError::WorkerSend { segment, source })
    }
}

/// Announces the worker's exit on the completion path when dropped, including on panic
struct ExitNotice {
    segment: usize,
    completions: Sender<usize>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        // The bridge may already be gone on the abort path.
        let _ = self.completions.send(self.segment);
    }
}

/// Starts the execution context one worker runs in.
///
/// The controller calls this with SIGINT blocked, so whatever the launcher starts
/// inherits the mask and never handles status queries itself.
pub trait WorkerLauncher: Send + Sync + 'static {
    fn launch(
        &self,
        job: WorkerJob,
        worker: Arc<dyn SegmentWorker>,
        completions: Sender<usize>,
    ) -> io::Result<JoinHandle<()>>;
}

/// Runs every worker on its own named thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLauncher;

impl WorkerLauncher for ThreadLauncher {
    /// Posts the segment index to `completions` as the thread's last act
    fn launch(
        &self,
        job: WorkerJob,
        worker: Arc<dyn SegmentWorker>,
        completions: Sender<usize>,
    ) -> io::Result<JoinHandle<()>> {
        let segment = job.segment.index;
        thread::Builder::new()
            .name(format!("charscout-worker-{segment}"))
            .spawn(move || {
                let _notice = ExitNotice {
                    segment,
                    completions,
                };
                trace!(segment, len = job.segment.len(), "worker started");
                if let Err(e) = worker.run(job) {
                    error!(segment, "worker failed: {e}");
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::channel::{result_channel, Delivery, ResultReceiver};
    use std::sync::mpsc;

    fn make_job(buffer: &[u8], segment: Segment, target: u8) -> (WorkerJob, ResultReceiver) {
        let (sender, receiver) = result_channel().unwrap();
        let job = WorkerJob {
            segment,
            buffer: Arc::from(buffer),
            target,
            sender,
        };
        (job, receiver)
    }

    #[test]
    fn test_count_byte_boundaries() {
        assert_eq!(count_byte(b"", b'a'), 0);
        assert_eq!(count_byte(b"bbbb", b'a'), 0);
        assert_eq!(count_byte(b"aaaa", b'a'), 4);
        assert_eq!(count_byte(&[0, 255, 0, 0], 0), 3);
    }

    #[test]
    fn test_byte_counter_reports_its_segment_only() {
        let segment = Segment {
            index: 1,
            start: 3,
            end: 6,
        };
        let (job, rx) = make_job(b"aabcaabcaa", segment, b'a');
        ByteCounter::new().run(job).unwrap();
        // Segment [3, 6) is "caa"
        assert_eq!(rx.receive(Duration::from_secs(1)).unwrap(), Delivery::Value(2));
    }

    #[test]
    fn test_empty_segment_reports_zero() {
        let segment = Segment {
            index: 3,
            start: 2,
            end: 2,
        };
        let (job, rx) = make_job(b"aa", segment, b'a');
        ByteCounter::with_pacing(Duration::from_millis(1)).run(job).unwrap();
        assert_eq!(rx.receive(Duration::from_secs(1)).unwrap(), Delivery::Value(0));
    }

    #[test]
    fn test_send_failure_is_fatal_for_the_worker() {
        let segment = Segment {
            index: 0,
            start: 0,
            end: 2,
        };
        let (job, rx) = make_job(b"aa", segment, b'a');
        drop(rx);
        let err = ByteCounter::new().run(job).unwrap_err();
        assert!(matches!(err, ScanError::WorkerSend { segment: 0, .. }));
    }

    #[test]
    fn test_spawned_worker_posts_exit_notice() {
        let segment = Segment {
            index: 5,
            start: 0,
            end: 4,
        };
        let (job, rx) = make_job(b"abca", segment, b'a');
        let (tx, completions) = mpsc::channel();
        let handle = ThreadLauncher
            .launch(job, Arc::new(ByteCounter::new()), tx)
            .unwrap();

        assert_eq!(rx.receive(Duration::from_secs(5)).unwrap(), Delivery::Value(2));
        assert_eq!(completions.recv_timeout(Duration::from_secs(5)).unwrap(), 5);
        handle.join().unwrap();
    }
}
