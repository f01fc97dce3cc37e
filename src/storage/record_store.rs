//! Single-record atomic replace and recovery
//!
//! A record is replaced in five forward-only states, each of which may be the
//! last one reached before a crash:
//!
//! | State | Action | Base record |
//! |-------|--------|-------------|
//! | S0 | lock file created | old content |
//! | S1 | base copied to temp | old content |
//! | S2 | temp overwritten with new content, synced | old content |
//! | S3 | base renamed to old shadow | absent |
//! | S4 | temp renamed onto base | new content |
//! | S5 | old shadow deleted, lock removed | new content |
//!
//! The base path is missing only between S3 and S4, and S2 finished before S3
//! began, so a missing base with both shadows present means the temp file is
//! complete and the commit can be rolled forward. In every other state the
//! base file already holds either the old or the new content and the shadows
//! are discarded.

use crate::config::LockConfig;
use crate::storage::listing::DirListing;
use crate::storage::lock::{lock_path, LockGuard};
use crate::storage::naming::{Protocol, RecordKey, ShadowKind, TransactionId};
use crate::types::LedgerError;
use log::{debug, error, info, warn};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Handle on one record file and the shadow pair of one transaction
///
/// Opening a store touches nothing on disk; the lock is taken by
/// [`RecordStore::lock`] and every mutating step requires the guard.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
    key: RecordKey,
    protocol: Protocol,
    txn: TransactionId,
    base: PathBuf,
    temp: PathBuf,
    old: PathBuf,
}

impl RecordStore {
    /// Open `key` in `dir` under a fresh transaction id
    ///
    /// # Errors
    ///
    /// - `DataDirMissing` if `dir` is not a directory
    /// - `RecordNotFound` if the base record does not exist
    pub fn open(dir: &Path, key: RecordKey, protocol: Protocol) -> Result<Self, LedgerError> {
        Self::open_with_txn(dir, key, protocol, TransactionId::generate())
    }

    /// Open `key` under a caller-chosen transaction id
    ///
    /// Transfers use this to stamp both sides with the same id.
    pub fn open_with_txn(
        dir: &Path,
        key: RecordKey,
        protocol: Protocol,
        txn: TransactionId,
    ) -> Result<Self, LedgerError> {
        if !dir.is_dir() {
            return Err(LedgerError::data_dir_missing(dir));
        }

        let base = dir.join(key.base_name());
        if !record_exists(dir, key) {
            return Err(LedgerError::record_not_found(&base));
        }

        Ok(RecordStore {
            dir: dir.to_path_buf(),
            key,
            protocol,
            temp: dir.join(key.shadow_name(&txn, protocol, ShadowKind::Temp)),
            old: dir.join(key.shadow_name(&txn, protocol, ShadowKind::Old)),
            base,
            txn,
        })
    }

    pub fn key(&self) -> RecordKey {
        self.key
    }

    pub fn txn(&self) -> &TransactionId {
        &self.txn
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    pub fn old_path(&self) -> &Path {
        &self.old
    }

    /// S0: take the record lock
    pub fn lock(&self, config: &LockConfig) -> Result<LockGuard, LedgerError> {
        LockGuard::acquire(&self.dir, self.key, config)
    }

    /// Read the committed content
    pub fn read(&self) -> Result<Vec<u8>, LedgerError> {
        fs::read(&self.base).map_err(|e| LedgerError::io("read", &self.base, e))
    }

    /// S1: copy the base record to the temp file
    pub fn stage(&self, guard: &LockGuard) -> Result<(), LedgerError> {
        self.check_guard(guard);
        fs::copy(&self.base, &self.temp).map_err(|e| LedgerError::io("copy", &self.base, e))?;
        debug!("S1 {} staged at {}", self.key, self.temp.display());
        Ok(())
    }

    /// S2: overwrite the temp file with `content` and sync it
    pub fn write_staged(&self, guard: &LockGuard, content: &[u8]) -> Result<(), LedgerError> {
        self.check_guard(guard);
        let mut file =
            File::create(&self.temp).map_err(|e| LedgerError::io("create", &self.temp, e))?;
        file.write_all(content)
            .and_then(|()| file.sync_all())
            .map_err(|e| LedgerError::io("write", &self.temp, e))?;
        debug!("S2 {} new content written", self.key);
        Ok(())
    }

    /// S3: move the base record aside to the old shadow
    pub fn retire_base(&self, guard: &LockGuard) -> Result<(), LedgerError> {
        self.check_guard(guard);
        fs::rename(&self.base, &self.old).map_err(|e| LedgerError::io("rename", &self.base, e))?;
        debug!("S3 {} moved to {}", self.key, self.old.display());
        Ok(())
    }

    /// S4: move the temp file onto the base path
    pub fn promote_staged(&self, guard: &LockGuard) -> Result<(), LedgerError> {
        self.check_guard(guard);
        fs::rename(&self.temp, &self.base)
            .map_err(|e| LedgerError::io("rename", &self.temp, e))?;
        debug!("S4 {} committed", self.key);
        Ok(())
    }

    /// S3 then S4
    pub fn commit(&self, guard: &LockGuard) -> Result<(), LedgerError> {
        self.retire_base(guard)?;
        self.promote_staged(guard)
    }

    /// S5 (first half): delete the old shadow
    ///
    /// The lock is released by the caller, after this returns.
    pub fn finish(&self, guard: &LockGuard) -> Result<(), LedgerError> {
        self.check_guard(guard);
        fs::remove_file(&self.old).map_err(|e| LedgerError::io("remove", &self.old, e))?;
        debug!("S5 {} old shadow removed", self.key);
        Ok(())
    }

    /// Remove both shadows without touching the base record
    ///
    /// Used on paths that abandon an update before S3.
    pub fn discard(&self, guard: &LockGuard) -> Result<(), LedgerError> {
        self.check_guard(guard);
        remove_if_exists(&self.temp)?;
        remove_if_exists(&self.old)?;
        Ok(())
    }

    /// Run S1 through S5 (minus the unlock) with `content`
    pub fn replace(&self, guard: &LockGuard, content: &[u8]) -> Result<(), LedgerError> {
        self.stage(guard)?;
        self.write_staged(guard, content)?;
        self.commit(guard)?;
        self.finish(guard)
    }

    /// Locked read-modify-write
    ///
    /// `f` receives the committed content and returns the replacement. If it
    /// fails, nothing is written and the lock is released.
    pub fn update<F>(&self, config: &LockConfig, f: F) -> Result<Vec<u8>, LedgerError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, LedgerError>,
    {
        let guard = self.lock(config)?;
        let current = self.read()?;
        let next = f(&current)?;
        if let Err(e) = self.replace(&guard, &next) {
            return Err(self.abort(guard, e));
        }
        guard.release()?;
        Ok(next)
    }

    /// Clean up after a failed protocol step and hand back the error
    ///
    /// With the base record in place the shadows are removed and the lock is
    /// released. Without it, everything stays on disk and the lock file is
    /// kept so recovery finishes the update.
    pub fn abort(&self, guard: LockGuard, err: LedgerError) -> LedgerError {
        if self.base.exists() {
            if let Err(e) = self.discard(&guard) {
                warn!("{}: failed to discard shadows: {}", self.key, e);
            }
            drop(guard);
        } else {
            let lock = guard.abandon();
            error!(
                "{} left between S3 and S4 ({}); keeping {} for recovery",
                self.key,
                err,
                lock.display()
            );
        }
        err
    }

    fn check_guard(&self, guard: &LockGuard) {
        debug_assert_eq!(guard.key(), self.key, "lock guard for a different record");
    }
}

/// Whether `key` has a record in `dir`
///
/// The base file is absent while another writer is between S3 and S4; that
/// writer holds the lock and its old shadow is on disk. A lock alone does not
/// count. The base is checked a second time in case the writer finished
/// between the first checks.
pub fn record_exists(dir: &Path, key: RecordKey) -> bool {
    let base = dir.join(key.base_name());
    base.is_file()
        || (lock_path(dir, key).exists() && has_old_shadow(dir, key))
        || base.is_file()
}

fn has_old_shadow(dir: &Path, key: RecordKey) -> bool {
    DirListing::read(dir).is_ok_and(|listing| {
        [Protocol::Update, Protocol::Transfer].into_iter().any(|protocol| {
            listing
                .shadows(protocol)
                .any(|(k, _, kind)| k == key && kind == ShadowKind::Old)
        })
    })
}

/// How to treat a shadow pair found after a crash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Finish a commit interrupted between S3 and S4
    RollForward,
    /// Never finish a commit; restore the old shadow if the base is missing
    Discard,
}

/// What recovery did to a record's base file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Base file already authoritative, shadows discarded
    Untouched,
    /// Temp file renamed onto the missing base
    Completed,
    /// Old shadow renamed back onto the missing base
    RolledBack,
    /// Base missing with only a temp file; left in place for inspection
    Unresolved,
}

/// Which files of a shadow pair exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowState {
    pub base: bool,
    pub temp: bool,
    pub old: bool,
}

impl ShadowState {
    /// The recovery decision for this combination
    pub fn decide(&self, policy: RecoveryPolicy) -> RecordOutcome {
        match (self.base, self.temp, self.old, policy) {
            (true, _, _, _) => RecordOutcome::Untouched,
            (false, true, true, RecoveryPolicy::RollForward) => RecordOutcome::Completed,
            (false, _, true, _) => RecordOutcome::RolledBack,
            (false, true, false, _) => RecordOutcome::Unresolved,
            (false, false, false, _) => RecordOutcome::Untouched,
        }
    }
}

/// Result of recovering one transaction's shadow pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRecovery {
    pub key: RecordKey,
    pub txn: TransactionId,
    pub outcome: RecordOutcome,
    /// Files deleted or renamed away
    pub removed: Vec<PathBuf>,
}

/// Resolve the shadow pair `(key, txn, protocol)` in `dir`
///
/// Leaves the lock file alone; see [`remove_lock`].
pub fn recover_transaction(
    dir: &Path,
    key: RecordKey,
    protocol: Protocol,
    txn: &TransactionId,
    policy: RecoveryPolicy,
) -> Result<RecordRecovery, LedgerError> {
    let base = dir.join(key.base_name());
    let temp = dir.join(key.shadow_name(txn, protocol, ShadowKind::Temp));
    let old = dir.join(key.shadow_name(txn, protocol, ShadowKind::Old));

    let state = ShadowState {
        base: base.exists(),
        temp: temp.exists(),
        old: old.exists(),
    };
    let outcome = state.decide(policy);
    let mut removed = Vec::new();

    match outcome {
        RecordOutcome::Completed => {
            info!(
                "RECOVER {} txn {}: completing commit, renaming {} to {}",
                key,
                txn,
                temp.display(),
                base.display()
            );
            rename(&temp, &base)?;
            removed.push(temp.clone());
        }
        RecordOutcome::RolledBack => {
            info!(
                "RECOVER {} txn {}: base missing, restoring {}",
                key,
                txn,
                old.display()
            );
            rename(&old, &base)?;
            removed.push(old.clone());
        }
        RecordOutcome::Unresolved => {
            error!(
                "RECOVER {} txn {}: base missing and no old shadow, leaving {}",
                key,
                txn,
                temp.display()
            );
            return Ok(RecordRecovery {
                key,
                txn: txn.clone(),
                outcome,
                removed,
            });
        }
        RecordOutcome::Untouched => {}
    }

    for path in [&old, &temp] {
        if remove_if_exists(path)? {
            info!("RECOVER {} txn {}: removed {}", key, txn, path.display());
            removed.push(path.clone());
        }
    }

    Ok(RecordRecovery {
        key,
        txn: txn.clone(),
        outcome,
        removed,
    })
}

/// Result of recovering every transaction left behind under one lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecovery {
    pub key: RecordKey,
    pub transactions: Vec<RecordRecovery>,
    /// The lock file, if one was found and deleted
    pub lock_removed: Option<PathBuf>,
}

impl LockRecovery {
    /// True if recovery found nothing to do
    pub fn is_noop(&self) -> bool {
        self.transactions.is_empty() && self.lock_removed.is_none()
    }
}

/// Recover one record after a crash, searching `dir` for its shadows
///
/// Every transaction id that left `protocol` shadows for `key` is resolved
/// with [`RecoveryPolicy::RollForward`], then the lock file is removed.
pub fn recover(
    dir: &Path,
    key: RecordKey,
    protocol: Protocol,
) -> Result<LockRecovery, LedgerError> {
    let listing = DirListing::read(dir)?;
    let mut transactions = Vec::new();
    for txn in listing.transactions_for(key, protocol) {
        transactions.push(recover_transaction(
            dir,
            key,
            protocol,
            &txn,
            RecoveryPolicy::RollForward,
        )?);
    }
    let lock_removed = remove_lock(dir, key)?;
    if let Some(path) = &lock_removed {
        info!("RECOVER {}: removed lock {}", key, path.display());
    }
    Ok(LockRecovery {
        key,
        transactions,
        lock_removed,
    })
}

/// Delete the lock file for `key` if present
pub fn remove_lock(dir: &Path, key: RecordKey) -> Result<Option<PathBuf>, LedgerError> {
    let path = lock_path(dir, key);
    Ok(remove_if_exists(&path)?.then_some(path))
}

fn rename(from: &Path, to: &Path) -> Result<(), LedgerError> {
    fs::rename(from, to).map_err(|e| LedgerError::io("rename", from, e))
}

/// Returns whether a file was removed
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, LedgerError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LedgerError::io("remove", path, e)),
    }
}
