//! Record lock files
//!
//! A record is locked while `<dir>/<stem>.lock` exists. Acquisition is an
//! exclusive create (`O_CREAT | O_EXCL`), retried on a fixed interval until
//! the configured timeout. The lock file is removed on release or when the
//! guard is dropped; only a crash leaves it behind, and recovery removes it.
//!
//! Locks are advisory: they only exclude writers that go through this module.

use crate::config::LockConfig;
use crate::storage::naming::RecordKey;
use crate::types::LedgerError;
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

/// Proof that the caller holds a record lock
///
/// Protocol steps that mutate a record take `&LockGuard` so they cannot run
/// without the lock.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    key: RecordKey,
    released: bool,
}

impl LockGuard {
    /// Acquire the lock for `key`, waiting up to `config.timeout`
    ///
    /// # Errors
    ///
    /// - `LockTimeout` if the lock file still exists when the timeout expires
    /// - `Io` if the lock file cannot be created for any other reason
    ///   (for example a missing data directory)
    pub fn acquire(dir: &Path, key: RecordKey, config: &LockConfig) -> Result<Self, LedgerError> {
        let start = Instant::now();
        let mut announced = false;

        loop {
            if let Some(guard) = Self::try_acquire(dir, key)? {
                return Ok(guard);
            }

            let waited = start.elapsed();
            if let Some(timeout) = config.timeout {
                if waited >= timeout {
                    return Err(LedgerError::lock_timeout(&lock_path(dir, key), waited));
                }
            }

            if !announced {
                debug!("lock for {} is held, waiting", key);
                announced = true;
            }
            thread::sleep(config.poll_interval);
        }
    }

    /// Make a single attempt to acquire the lock for `key`
    ///
    /// Returns `Ok(None)` if another writer holds it.
    pub fn try_acquire(dir: &Path, key: RecordKey) -> Result<Option<Self>, LedgerError> {
        let path = lock_path(dir, key);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // Owner pid is informational only; recovery ignores content.
                writeln!(file, "{}", std::process::id())
                    .map_err(|e| LedgerError::io("write lock", &path, e))?;
                debug!("locked {}", path.display());
                Ok(Some(LockGuard {
                    path,
                    key,
                    released: false,
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(LedgerError::io("create lock", &path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> RecordKey {
        self.key
    }

    /// Remove the lock file, reporting failure
    pub fn release(mut self) -> Result<(), LedgerError> {
        self.released = true;
        fs::remove_file(&self.path).map_err(|e| LedgerError::io("remove lock", &self.path, e))?;
        debug!("unlocked {}", self.path.display());
        Ok(())
    }

    /// Give up the guard but leave the lock file on disk
    ///
    /// The record stays locked until recovery runs.
    pub fn abandon(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("unlocked {}", self.path.display()),
            Err(e) => warn!("failed to remove lock {}: {}", self.path.display(), e),
        }
    }
}

/// Path of the lock file for `key`
pub fn lock_path(dir: &Path, key: RecordKey) -> PathBuf {
    dir.join(key.lock_name())
}
