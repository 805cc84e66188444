use std::ops::Range;

use crate::errors::{ScanError, ScanResult};

/// A contiguous sub-range of the input buffer assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Position of the segment in partition order
    pub index: usize,
    /// First byte offset (inclusive)
    pub start: usize,
    /// One past the last byte offset
    pub end: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Splits `[0, len)` into `workers` contiguous segments whose sizes differ by at most one.
///
/// The first `len % workers` segments carry the extra byte, so no remainder segment is
/// needed. When `len < workers` the trailing segments are empty.
pub fn partition(len: usize, workers: usize) -> ScanResult<Vec<Segment>> {
    if workers == 0 {
        return Err(ScanError::invalid_config(
            "worker count must be positive, got 0",
        ));
    }

    let base = len / workers;
    let remainder = len % workers;

    let segments = (0..workers)
        .map(|index| {
            let start = index * base + index.min(remainder);
            let size = base + usize::from(index < remainder);
            Segment {
                index,
                start,
                end: start + size,
            }
        })
        .collect();

    Ok(segments)
}
