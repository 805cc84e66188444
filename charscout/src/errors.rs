/// Error types for charscout.
///
/// Every fatal condition of a scan surfaces as a single [`ScanError`] returned to the
/// caller. Conditions the controller recovers from locally (a worker that closes its
/// channel without reporting) are not errors; they are recorded as
/// [`crate::results::ScanWarning`]s on the outcome instead.
///
/// ```rust,ignore
/// match controller.scan(buffer, b'a') {
///     Ok(outcome) => println!("{}", outcome.total),
///     Err(ScanError::ChannelTimeout { segment, .. }) => // segment never answered,
///     Err(ScanError::InvalidConfig(msg)) => // bad worker count,
///     Err(e) => // everything else
/// }
/// ```
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while configuring or running a scan
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File is empty: {0}")]
    EmptyInput(PathBuf),
    #[error("Failed to spawn worker for segment {segment}: {source}")]
    Spawn {
        segment: usize,
        #[source]
        source: io::Error,
    },
    #[error("Timed out after {timeout:?} waiting for a result from segment {segment}")]
    ChannelTimeout { segment: usize, timeout: Duration },
    #[error("Result channel for segment {segment} failed: {source}")]
    Channel {
        segment: usize,
        #[source]
        source: io::Error,
    },
    #[error("Worker for segment {segment} could not deliver its result: {source}")]
    WorkerSend {
        segment: usize,
        #[source]
        source: io::Error,
    },
    #[error("Signal handler setup failed: {0}")]
    Signal(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl ScanError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn signal(msg: impl Into<String>) -> Self {
        Self::Signal(msg.into())
    }

    /// Maps an I/O error raised while touching `path` to the most specific variant
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound(path.into()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::IoError(err),
        }
    }

    /// Whether this error aborted a scan after workers were already running
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. } | Self::ChannelTimeout { .. } | Self::Channel { .. }
        )
    }
}
