//! Account number allocator
//!
//! `index.idx` holds the last id handed out as a single decimal line. Ids are
//! allocated with a locked read-increment-write through the same
//! [`RecordStore`] update protocol as account balances, so an interrupted
//! allocation is repaired by ordinary recovery.

use crate::config::LockConfig;
use crate::storage::{Protocol, RecordKey, RecordStore};
use crate::types::{AccountId, LedgerError};
use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// The allocator record of one data directory
#[derive(Debug, Clone)]
pub struct AccountIndex {
    dir: PathBuf,
    lock: LockConfig,
}

impl AccountIndex {
    pub fn new(dir: &Path, lock: LockConfig) -> Self {
        AccountIndex {
            dir: dir.to_path_buf(),
            lock,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(RecordKey::Index.base_name())
    }

    /// Create `index.idx` holding `0` if it does not exist
    ///
    /// Returns whether the file was created. Between S3 and S4 of an
    /// allocation the base file is absent while `index.lock` is held, so a
    /// held lock means the file is left alone.
    pub fn ensure(&self) -> Result<bool, LedgerError> {
        let path = self.path();
        let lock = self.dir.join(RecordKey::Index.lock_name());
        if lock.exists() {
            debug!("{} held, not creating the index", lock.display());
            return Ok(false);
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(encode(0).as_bytes())
                    .and_then(|()| file.sync_all())
                    .map_err(|e| LedgerError::io("write", &path, e))?;
                info!("created account index {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(LedgerError::io("create", &path, e)),
        }
    }

    /// The last id handed out, read without the lock
    pub fn current(&self) -> Result<AccountId, LedgerError> {
        let path = self.path();
        let content = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LedgerError::record_not_found(&path),
            _ => LedgerError::io("read", &path, e),
        })?;
        decode(&content, &path)
    }

    /// Allocate the next account id
    pub fn next_id(&self) -> Result<AccountId, LedgerError> {
        let store = RecordStore::open(&self.dir, RecordKey::Index, Protocol::Update)?;
        let path = store.base_path().to_path_buf();

        let written = store.update(&self.lock, |content| {
            let last = decode(content, &path)?;
            let next = last.checked_add(1).ok_or_else(|| {
                LedgerError::malformed_record(&path, "account index exhausted")
            })?;
            Ok(encode(next).into_bytes())
        })?;

        let id = decode(&written, &path)?;
        debug!("allocated account id {}", id);
        Ok(id)
    }
}

fn encode(id: AccountId) -> String {
    format!("{}\n", id)
}

fn decode(content: &[u8], path: &Path) -> Result<AccountId, LedgerError> {
    let text = std::str::from_utf8(content)
        .map_err(|_| LedgerError::malformed_record(path, "index is not valid UTF-8"))?;
    let line = text.lines().next().unwrap_or("").trim();
    line.parse()
        .map_err(|_| LedgerError::malformed_record(path, format!("invalid index value '{}'", line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;
    use tempfile::TempDir;

    fn index(dir: &TempDir) -> AccountIndex {
        AccountIndex::new(
            dir.path(),
            LockConfig::new(Duration::from_millis(5), Some(Duration::from_millis(100))),
        )
    }

    #[test]
    fn test_ensure_creates_once() {
        let dir = TempDir::new().unwrap();
        let index = index(&dir);

        assert!(index.ensure().unwrap());
        assert_eq!(fs::read_to_string(index.path()).unwrap(), "0\n");

        fs::write(index.path(), "12\n").unwrap();
        assert!(!index.ensure().unwrap());
        assert_eq!(index.current().unwrap(), 12);
    }

    #[test]
    fn test_ensure_skips_while_lock_is_held() {
        let dir = TempDir::new().unwrap();
        let index = index(&dir);
        fs::write(dir.path().join("index.lock"), "").unwrap();

        assert!(!index.ensure().unwrap());
        assert!(!index.path().exists());
    }

    #[test]
    fn test_next_id_increments_and_persists() {
        let dir = TempDir::new().unwrap();
        let index = index(&dir);
        index.ensure().unwrap();

        assert_eq!(index.next_id().unwrap(), 1);
        assert_eq!(index.next_id().unwrap(), 2);
        assert_eq!(index.next_id().unwrap(), 3);
        assert_eq!(fs::read_to_string(index.path()).unwrap(), "3\n");

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["index.idx"]);
    }

    #[test]
    fn test_next_id_without_index_is_record_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            index(&dir).next_id(),
            Err(LedgerError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_next_id_waits_for_held_lock_then_times_out() {
        let dir = TempDir::new().unwrap();
        let index = index(&dir);
        index.ensure().unwrap();
        fs::write(dir.path().join("index.lock"), "").unwrap();

        assert!(matches!(
            index.next_id(),
            Err(LedgerError::LockTimeout { .. })
        ));
        assert_eq!(index.current().unwrap(), 0);
    }

    #[rstest]
    #[case::plain("7\n", Some(7))]
    #[case::no_newline("41", Some(41))]
    #[case::padded("  9  \n", Some(9))]
    #[case::empty("", None)]
    #[case::negative("-1\n", None)]
    #[case::text("seven\n", None)]
    fn test_decode(#[case] content: &str, #[case] expected: Option<AccountId>) {
        let result = decode(content.as_bytes(), Path::new("index.idx"));
        assert_eq!(result.ok(), expected);
    }
}
