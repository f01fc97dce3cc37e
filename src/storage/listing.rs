//! Data directory listing
//!
//! Reads the directory once and classifies every regular file with
//! [`Artifact::parse`]. Names that do not parse are kept aside, untouched.

use crate::storage::naming::{Artifact, Protocol, RecordKey, ShadowKind, TransactionId};
use crate::types::{AccountId, LedgerError};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Classified contents of a data directory
#[derive(Debug, Clone, Default)]
pub struct DirListing {
    /// Files the store recognises
    pub artifacts: Vec<Artifact>,
    /// Files left alone because their names did not parse
    pub unrecognized: Vec<String>,
}

impl DirListing {
    /// List `dir`, skipping sub-directories
    pub fn read(dir: &Path) -> Result<Self, LedgerError> {
        let entries = fs::read_dir(dir).map_err(|e| LedgerError::io("read dir", dir, e))?;

        let mut listing = DirListing::default();
        for entry in entries {
            let entry = entry.map_err(|e| LedgerError::io("read dir", dir, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| LedgerError::io("stat", &entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }

            let name = entry.file_name();
            match name.to_str().and_then(Artifact::parse) {
                Some(artifact) => listing.artifacts.push(artifact),
                None => listing
                    .unrecognized
                    .push(name.to_string_lossy().into_owned()),
            }
        }

        listing.artifacts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        listing.unrecognized.sort();
        Ok(listing)
    }

    /// Records with a lock file present
    pub fn locks(&self) -> impl Iterator<Item = RecordKey> + '_ {
        self.artifacts.iter().filter_map(|a| match a {
            Artifact::Lock(key) => Some(*key),
            _ => None,
        })
    }

    /// Shadow files written by `protocol`, as `(key, txn, kind)`
    pub fn shadows(
        &self,
        protocol: Protocol,
    ) -> impl Iterator<Item = (RecordKey, &TransactionId, ShadowKind)> + '_ {
        self.artifacts.iter().filter_map(move |a| match a {
            Artifact::Shadow {
                key,
                txn,
                protocol: p,
                kind,
            } if *p == protocol => Some((*key, txn, *kind)),
            _ => None,
        })
    }

    /// Transaction ids that left `protocol` shadows for `key`
    pub fn transactions_for(&self, key: RecordKey, protocol: Protocol) -> BTreeSet<TransactionId> {
        self.shadows(protocol)
            .filter(|(k, _, _)| *k == key)
            .map(|(_, txn, _)| txn.clone())
            .collect()
    }

    /// Leftover account-creation staging files
    pub fn creations(&self) -> impl Iterator<Item = &Artifact> + '_ {
        self.artifacts
            .iter()
            .filter(|a| matches!(a, Artifact::Creation(_)))
    }

    /// Committed account ids, ascending
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self
            .artifacts
            .iter()
            .filter_map(|a| match a {
                Artifact::Base(RecordKey::Account(id)) => Some(*id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids
    }
}
