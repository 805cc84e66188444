pub mod bridge;
pub mod config;
pub mod errors;
pub mod input;
pub mod metrics;
pub mod results;
pub mod scan;
pub mod signals;

pub use config::ScanConfig;
pub use errors::{ScanError, ScanResult};
pub use results::{PartialResult, ScanOutcome, ScanWarning};
pub use scan::{ScanController, SegmentWorker};
