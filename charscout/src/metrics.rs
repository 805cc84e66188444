use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracks worker lifecycle and throughput counters for a scan
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // Input
    bytes_partitioned: Arc<AtomicU64>,

    // Worker lifecycle
    workers_spawned: Arc<AtomicU64>,
    workers_reaped: Arc<AtomicU64>,

    // Collection
    results_received: Arc<AtomicU64>,
    lost_workers: Arc<AtomicU64>,

    // Status queries answered
    status_reports: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            bytes_partitioned: Arc::new(AtomicU64::new(0)),
            workers_spawned: Arc::new(AtomicU64::new(0)),
            workers_reaped: Arc::new(AtomicU64::new(0)),
            results_received: Arc::new(AtomicU64::new(0)),
            lost_workers: Arc::new(AtomicU64::new(0)),
            status_reports: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a buffer handed to the partitioner
    pub fn record_partition(&self, bytes: u64) {
        let total = self.bytes_partitioned.fetch_add(bytes, Ordering::Relaxed) + bytes;
        debug!("Partitioned {} bytes, total: {} bytes", bytes, total);
    }

    pub fn record_spawn(&self) {
        self.workers_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reaped(&self, workers: u64) {
        if workers > 0 {
            self.workers_reaped.fetch_add(workers, Ordering::Relaxed);
        }
    }

    /// Records one channel outcome; `delivered` is false for a lost worker
    pub fn record_result(&self, delivered: bool) {
        if delivered {
            self.results_received.fetch_add(1, Ordering::Relaxed);
        } else {
            self.lost_workers.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_status_reports(&self, reports: u64) {
        self.status_reports.fetch_add(reports, Ordering::Relaxed);
    }

    /// Gets current counters
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            bytes_partitioned: self.bytes_partitioned.load(Ordering::Relaxed),
            workers_spawned: self.workers_spawned.load(Ordering::Relaxed),
            workers_reaped: self.workers_reaped.load(Ordering::Relaxed),
            results_received: self.results_received.load(Ordering::Relaxed),
            lost_workers: self.lost_workers.load(Ordering::Relaxed),
            status_reports: self.status_reports.load(Ordering::Relaxed),
        }
    }

    /// Logs current counters
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Bytes partitioned: {}\n\
             Workers spawned/reaped: {}/{}\n\
             Results received/lost: {}/{}\n\
             Status reports: {}",
            stats.bytes_partitioned,
            stats.workers_spawned,
            stats.workers_reaped,
            stats.results_received,
            stats.lost_workers,
            stats.status_reports
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub bytes_partitioned: u64,
    pub workers_spawned: u64,
    pub workers_reaped: u64,
    pub results_received: u64,
    pub lost_workers: u64,
    pub status_reports: u64,
}
