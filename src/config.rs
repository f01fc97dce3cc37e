//! Store configuration
//!
//! Where the record files live and how long writers wait for a record lock.

use log::warn;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default interval between lock acquisition attempts
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default upper bound on lock acquisition
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for lock acquisition
///
/// A writer retries the exclusive create of a lock file every `poll_interval`
/// until it succeeds or `timeout` has elapsed. `timeout: None` waits forever.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockConfig {
    /// Sleep between attempts
    pub poll_interval: Duration,
    /// Give up after this long
    pub timeout: Option<Duration>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            timeout: Some(DEFAULT_LOCK_TIMEOUT),
        }
    }
}

impl LockConfig {
    /// Create a new LockConfig with custom values
    ///
    /// Zero durations fall back to the defaults.
    pub fn new(poll_interval: Duration, timeout: Option<Duration>) -> Self {
        let default = Self::default();

        let poll_interval = if poll_interval.is_zero() {
            warn!(
                "Invalid lock poll interval ({:?}), using default ({:?})",
                poll_interval, default.poll_interval
            );
            default.poll_interval
        } else {
            poll_interval
        };

        let timeout = match timeout {
            Some(t) if t.is_zero() => {
                warn!(
                    "Invalid lock timeout ({:?}), using default ({:?})",
                    t, default.timeout
                );
                default.timeout
            }
            other => other,
        };

        Self {
            poll_interval,
            timeout,
        }
    }

    /// Wait for locks without an upper bound
    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }
}

/// Configuration for a ledger data directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding record, lock, and shadow files
    pub data_dir: PathBuf,
    /// Lock acquisition settings shared by every writer
    pub lock: LockConfig,
}

impl StoreConfig {
    /// Create a config for `data_dir` with default lock settings
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock: LockConfig::default(),
        }
    }

    /// Replace the lock settings
    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
