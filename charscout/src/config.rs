use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ScanError, ScanResult};

/// Environment variable that overrides the worker count
pub const WORKER_COUNT_ENV: &str = "P";

/// Configuration for a scan.
///
/// # Configuration Locations
///
/// Values are layered in order of increasing precedence:
/// 1. Global `$HOME/.config/charscout/config.yaml`
/// 2. Local `.charscout.yaml` in the current directory
/// 3. Custom config file specified via `--config`
/// 4. `CHARSCOUT_*` environment variables (e.g. `CHARSCOUT_CHANNEL_TIMEOUT_MS`)
/// 5. The `P` environment variable, for the worker count only
///
/// # Configuration Format
///
/// ```yaml
/// # Number of workers the input is split across
/// worker_count: 4
///
/// # How long to wait on each worker's result channel
/// channel_timeout_ms: 5000
///
/// # Minimum spacing between two status lines
/// status_debounce_ms: 1000
///
/// # Per-byte delay inside workers, useful to observe status queries
/// worker_pacing_us: 0
///
/// # Print worker status on SIGINT instead of terminating
/// handle_signals: true
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "warn"
/// ```
///
/// The worker count is kept signed so that `P=-3` is reported as an error instead of
/// failing to parse or being clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of workers; must be positive
    #[serde(default = "default_worker_count")]
    pub worker_count: i64,

    /// Per-channel wait bound in milliseconds
    #[serde(default = "default_channel_timeout_ms")]
    pub channel_timeout_ms: u64,

    /// Status query debounce window in milliseconds
    #[serde(default = "default_status_debounce_ms")]
    pub status_debounce_ms: u64,

    /// Per-byte worker delay in microseconds (0 disables pacing)
    #[serde(default)]
    pub worker_pacing_us: u64,

    /// Whether SIGINT is captured for status queries during a scan
    #[serde(default = "default_handle_signals")]
    pub handle_signals: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_worker_count() -> i64 {
    4
}

fn default_channel_timeout_ms() -> u64 {
    5_000
}

fn default_status_debounce_ms() -> u64 {
    1_000
}

fn default_handle_signals() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            channel_timeout_ms: default_channel_timeout_ms(),
            status_debounce_ms: default_status_debounce_ms(),
            worker_pacing_us: 0,
            handle_signals: default_handle_signals(),
            log_level: default_log_level(),
        }
    }
}

/// Values supplied on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub worker_count: Option<i64>,
    pub channel_timeout: Option<Duration>,
    pub worker_pacing: Option<Duration>,
    pub log_level: Option<String>,
}

impl ScanConfig {
    /// Loads configuration, layering a specific file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> ScanResult<Self> {
        Self::load_with(config_path, std::env::var(WORKER_COUNT_ENV).ok())
    }

    /// Loads configuration with an explicit value for the worker-count variable.
    ///
    /// The value must be a plain decimal integer. Words the config layer would coerce to a
    /// number, such as `yes` or `on`, are rejected.
    pub fn load_with(
        config_path: Option<&Path>,
        worker_override: Option<String>,
    ) -> ScanResult<Self> {
        let worker_override = worker_override
            .map(|raw| parse_worker_count(&raw))
            .transpose()?;

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("charscout/config.yaml")),
            // Local config
            Some(PathBuf::from(".charscout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly requested file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder
            .add_source(Environment::with_prefix("CHARSCOUT").try_parsing(true))
            .set_override_option("worker_count", worker_override)?;

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Command-line values take precedence over everything loaded
    pub fn merge_with_cli(mut self, cli: ScanOverrides) -> Self {
        if let Some(workers) = cli.worker_count {
            self.worker_count = workers;
        }
        if let Some(timeout) = cli.channel_timeout {
            self.channel_timeout_ms = duration_to_millis(timeout);
        }
        if let Some(pacing) = cli.worker_pacing {
            self.worker_pacing_us = u64::try_from(pacing.as_micros()).unwrap_or(u64::MAX);
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// The validated worker count. Zero and negative counts are errors, never clamped.
    pub fn worker_count(&self) -> ScanResult<NonZeroUsize> {
        usize::try_from(self.worker_count)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| {
                ScanError::invalid_config(format!(
                    "worker count must be positive, got {}",
                    self.worker_count
                ))
            })
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_millis(self.channel_timeout_ms)
    }

    pub fn status_debounce(&self) -> Duration {
        Duration::from_millis(self.status_debounce_ms)
    }

    pub fn worker_pacing(&self) -> Duration {
        Duration::from_micros(self.worker_pacing_us)
    }
}

fn parse_worker_count(raw: &str) -> ScanResult<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        ScanError::invalid_config(format!(
            "{WORKER_COUNT_ENV} must be an integer, got {raw:?}"
        ))
    })
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
