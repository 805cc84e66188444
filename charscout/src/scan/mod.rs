/// Parallel single-byte scanning.
///
/// The input buffer is split into near-equal contiguous segments by [`partition`], and
/// each segment is handed to a worker thread running a [`SegmentWorker`]. Every worker
/// reports exactly one count over its own one-shot [`channel`], and the
/// [`ScanController`] collects those counts in segment order:
///
/// ```text
/// buffer ──► partition ──► [seg 0] [seg 1] ... [seg N-1]
///                             │       │            │
///                          worker  worker       worker
///                             │       │            │
///                          channel channel      channel
///                             └───────┴─────┬──────┘
///                                      controller ──► ScanOutcome
/// ```
///
/// Workers only ever see an `Arc<[u8]>`, so the buffer cannot be mutated once the scan
/// starts. A channel that closes without a count is tolerated and counted as zero; a
/// channel that stays silent past its timeout aborts the whole scan.
pub mod channel;
pub mod controller;
pub mod partition;
pub mod worker;

pub use controller::{ScanController, ScanPhase};
pub use partition::{partition, Segment};
pub use worker::{count_byte, ByteCounter, SegmentWorker, ThreadLauncher, WorkerJob, WorkerLauncher};
