/// Result types produced by a scan.
///
/// A scan yields one [`PartialResult`] per segment, in segment order, and folds them
/// into a [`ScanOutcome`]. The running total is kept in an `i64` so a file holding more
/// than `u32::MAX` matches cannot overflow it.
use std::fmt;
use std::path::Path;

use crate::scan::partition::Segment;

/// The count one worker reported for its segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialResult {
    /// The segment the count covers
    pub segment: Segment,
    /// Matches found in the segment
    pub count: i64,
    /// False when the worker vanished and the count was substituted with zero
    pub delivered: bool,
}

/// Conditions the controller recovered from without failing the scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanWarning {
    /// The worker's channel closed before a full count arrived
    LostWorker {
        segment: usize,
        bytes_received: usize,
    },
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanWarning::LostWorker {
                segment,
                bytes_received,
            } => write!(
                f,
                "worker for segment {} exited after sending {} of 8 bytes; counted as 0",
                segment, bytes_received
            ),
        }
    }
}

/// The aggregate of a completed scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// The byte that was counted
    pub target: u8,
    /// Sum of all partial counts
    pub total: i64,
    /// Per-segment results, in segment order
    pub partials: Vec<PartialResult>,
    /// Recovered conditions, in the order they were observed
    pub warnings: Vec<ScanWarning>,
}

impl ScanOutcome {
    /// Creates an empty outcome for `target`
    pub fn new(target: u8) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Adds one segment's result to the running total
    pub fn add_partial(&mut self, partial: PartialResult) {
        self.total += partial.count;
        self.partials.push(partial);
    }

    /// Records a worker that vanished without reporting; it contributes zero
    pub fn add_lost_worker(&mut self, segment: Segment, bytes_received: usize) {
        self.warnings.push(ScanWarning::LostWorker {
            segment: segment.index,
            bytes_received,
        });
        self.add_partial(PartialResult {
            segment,
            count: 0,
            delivered: false,
        });
    }

    /// Counts per segment, in segment order
    pub fn counts(&self) -> Vec<i64> {
        self.partials.iter().map(|p| p.count).collect()
    }

    /// True when every worker delivered its count
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    /// The line written to the output file. The target byte is written as is, unescaped.
    pub fn summary_line(&self, input: &Path) -> Vec<u8> {
        let mut line = b"The character '".to_vec();
        line.push(self.target);
        line.extend_from_slice(
            format!("' appears {} times in file {}.\n", self.total, input.display()).as_bytes(),
        );
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(index: usize, start: usize, end: usize) -> Segment {
        Segment { index, start, end }
    }

    #[test]
    fn test_outcome_new() {
        let outcome = ScanOutcome::new(b'a');
        assert_eq!(outcome.target, b'a');
        assert_eq!(outcome.total, 0);
        assert!(outcome.partials.is_empty());
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_outcome_add_partial() {
        let mut outcome = ScanOutcome::new(b'a');
        outcome.add_partial(PartialResult {
            segment: segment(0, 0, 3),
            count: 2,
            delivered: true,
        });
        outcome.add_partial(PartialResult {
            segment: segment(1, 3, 6),
            count: 1,
            delivered: true,
        });

        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.counts(), vec![2, 1]);
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_lost_worker_contributes_zero() {
        let mut outcome = ScanOutcome::new(b'a');
        outcome.add_partial(PartialResult {
            segment: segment(0, 0, 5),
            count: 4,
            delivered: true,
        });
        outcome.add_lost_worker(segment(1, 5, 10), 3);

        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.counts(), vec![4, 0]);
        assert!(!outcome.is_complete());
        assert_eq!(
            outcome.warnings[0].to_string(),
            "worker for segment 1 exited after sending 3 of 8 bytes; counted as 0"
        );
    }

    #[test]
    fn test_total_exceeds_u32() {
        let mut outcome = ScanOutcome::new(0);
        for index in 0..3 {
            outcome.add_partial(PartialResult {
                segment: segment(index, 0, 0),
                count: i64::from(u32::MAX),
                delivered: true,
            });
        }
        assert_eq!(outcome.total, 3 * i64::from(u32::MAX));
    }

    #[test]
    fn test_summary_line() {
        let mut outcome = ScanOutcome::new(b'a');
        outcome.total = 5;
        assert_eq!(
            outcome.summary_line(Path::new("input.txt")),
            b"The character 'a' appears 5 times in file input.txt.\n"
        );
    }

    #[test]
    fn test_summary_line_writes_raw_target_byte() {
        let mut outcome = ScanOutcome::new(b'\n');
        outcome.total = 2;
        assert_eq!(
            outcome.summary_line(Path::new("log")),
            b"The character '\n' appears 2 times in file log.\n"
        );

        let outcome = ScanOutcome::new(0xff);
        assert_eq!(outcome.summary_line(Path::new("bin"))[15], 0xff);
    }
}
