//! Startup recovery scan
//!
//! Run once before a ledger accepts work. The directory is listed once and
//! resolved in three passes:
//!
//! - **Pass A** groups transfer shadows by transaction id. A group of two is
//!   a transfer with both sides left behind and each side is resolved with
//!   [`RecoveryPolicy::RollForward`]. Any other group has no corroborating
//!   side and is resolved with [`RecoveryPolicy::Discard`]. The locks of
//!   every record touched here are then removed.
//! - **Pass B** runs the single-record recovery rule for every remaining
//!   lock and every record with update shadows.
//! - **Pass C** deletes abandoned account-creation staging files.
//!
//! File names that do not parse are reported and never touched. Running the
//! scan twice in a row is a no-op the second time.

use crate::storage::record_store::{
    self, recover_transaction, remove_if_exists, remove_lock, LockRecovery, RecordOutcome,
};
use crate::storage::{
    DirListing, Protocol, RecordKey, RecordRecovery, RecoveryPolicy, TransactionId,
};
use crate::types::LedgerError;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Both sides (or the lone side) of one interrupted transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecovery {
    pub txn: TransactionId,
    /// Whether both sides were found
    pub paired: bool,
    pub sides: Vec<RecordRecovery>,
}

/// Everything one scan did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Pass A
    pub transfers: Vec<TransferRecovery>,
    /// Pass B, records that had something to recover
    pub updates: Vec<LockRecovery>,
    /// Lock files deleted across passes A and B
    pub locks_removed: usize,
    /// Pass C
    pub creations_removed: Vec<PathBuf>,
    /// Files left alone because their names did not parse
    pub unrecognized: Vec<String>,
}

impl RecoveryReport {
    /// True if the directory needed no repair
    pub fn is_clean(&self) -> bool {
        self.transfers.is_empty()
            && self.updates.is_empty()
            && self.locks_removed == 0
            && self.creations_removed.is_empty()
    }

    /// Records left with a temp file and no base, needing manual attention
    pub fn unresolved(&self) -> Vec<&RecordRecovery> {
        self.transfers
            .iter()
            .flat_map(|t| t.sides.iter())
            .chain(self.updates.iter().flat_map(|u| u.transactions.iter()))
            .filter(|r| r.outcome == RecordOutcome::Unresolved)
            .collect()
    }
}

/// Scanner over one data directory
#[derive(Debug, Clone)]
pub struct RecoveryScanner {
    dir: PathBuf,
}

impl RecoveryScanner {
    pub fn new(dir: &Path) -> Self {
        RecoveryScanner {
            dir: dir.to_path_buf(),
        }
    }

    /// Run all three passes
    ///
    /// # Errors
    ///
    /// - `DataDirMissing` if the directory does not exist
    /// - `Io` if a file cannot be listed, renamed, or removed; the scan stops
    ///   and can be re-run
    pub fn run(&self) -> Result<RecoveryReport, LedgerError> {
        if !self.dir.is_dir() {
            return Err(LedgerError::data_dir_missing(&self.dir));
        }

        let listing = DirListing::read(&self.dir)?;
        let mut report = RecoveryReport {
            unrecognized: listing.unrecognized.clone(),
            ..RecoveryReport::default()
        };
        for name in &report.unrecognized {
            warn!("RECOVER leaving unrecognized file {}", name);
        }

        let transfer_keys = self.recover_transfers(&listing, &mut report)?;
        self.recover_updates(&listing, &transfer_keys, &mut report)?;
        self.remove_creations(&listing, &mut report)?;

        if report.is_clean() {
            debug!("RECOVER {}: nothing to recover", self.dir.display());
        } else {
            info!(
                "RECOVER {}: {} transfer(s), {} update(s), {} lock(s), {} creation file(s)",
                self.dir.display(),
                report.transfers.len(),
                report.updates.len(),
                report.locks_removed,
                report.creations_removed.len()
            );
        }
        for record in report.unresolved() {
            warn!(
                "RECOVER {} txn {} needs manual attention",
                record.key, record.txn
            );
        }
        Ok(report)
    }

    /// Pass A; returns every record it touched
    fn recover_transfers(
        &self,
        listing: &DirListing,
        report: &mut RecoveryReport,
    ) -> Result<BTreeSet<RecordKey>, LedgerError> {
        let mut touched = BTreeSet::new();

        for (txn, keys) in find_pairs(listing) {
            let paired = keys.len() == 2;
            let policy = if paired {
                RecoveryPolicy::RollForward
            } else {
                RecoveryPolicy::Discard
            };
            info!(
                "RECOVER transfer txn {}: {} side(s), {:?}",
                txn,
                keys.len(),
                policy
            );

            let mut sides = Vec::with_capacity(keys.len());
            for key in keys {
                sides.push(recover_transaction(
                    &self.dir,
                    key,
                    Protocol::Transfer,
                    &txn,
                    policy,
                )?);
                touched.insert(key);
            }
            report.transfers.push(TransferRecovery { txn, paired, sides });
        }

        for key in &touched {
            if let Some(path) = remove_lock(&self.dir, *key)? {
                info!("RECOVER {}: removed lock {}", key, path.display());
                report.locks_removed += 1;
            }
        }
        Ok(touched)
    }

    /// Pass B
    fn recover_updates(
        &self,
        listing: &DirListing,
        transfer_keys: &BTreeSet<RecordKey>,
        report: &mut RecoveryReport,
    ) -> Result<(), LedgerError> {
        let keys: BTreeSet<RecordKey> = listing
            .locks()
            .filter(|key| !transfer_keys.contains(key))
            .chain(listing.shadows(Protocol::Update).map(|(key, _, _)| key))
            .collect();

        for key in keys {
            let recovery = record_store::recover(&self.dir, key, Protocol::Update)?;
            if recovery.lock_removed.is_some() {
                report.locks_removed += 1;
            }
            if !recovery.is_noop() {
                report.updates.push(recovery);
            }
        }
        Ok(())
    }

    /// Pass C
    fn remove_creations(
        &self,
        listing: &DirListing,
        report: &mut RecoveryReport,
    ) -> Result<(), LedgerError> {
        for artifact in listing.creations() {
            let path = self.dir.join(artifact.file_name());
            if remove_if_exists(&path)? {
                info!("RECOVER removed abandoned creation {}", path.display());
                report.creations_removed.push(path);
            }
        }
        Ok(())
    }
}

/// Group transfer shadows by transaction id
pub fn find_pairs(listing: &DirListing) -> BTreeMap<TransactionId, BTreeSet<RecordKey>> {
    let mut pairs: BTreeMap<TransactionId, BTreeSet<RecordKey>> = BTreeMap::new();
    for (key, txn, _) in listing.shadows(Protocol::Transfer) {
        pairs.entry(txn.clone()).or_default().insert(key);
    }
    pairs
}
