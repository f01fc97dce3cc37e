//! Artifact naming
//!
//! Every file the store creates in the data directory has a name built here,
//! and every name found during recovery is parsed back here. The parser is
//! strict: a name is classified only if formatting its parsed value yields
//! exactly the same string, so recovery never acts on a file it merely
//! pattern-matched.
//!
//! | Artifact | Name |
//! |----------|------|
//! | account record | `<id>.txt` |
//! | index record | `index.idx` |
//! | lock | `<stem>.lock` |
//! | shadow | `<stem>_<txn>.<ext>.<suffix>` |
//! | creation staging | `<id>.txt.atmp` |
//!
//! Shadow suffixes are `tmp`/`old` for single-record updates and
//! `xtmp`/`xold` for transfers.

use crate::types::{AccountId, LedgerError};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

pub const ACCOUNT_EXT: &str = "txt";
pub const INDEX_STEM: &str = "index";
pub const INDEX_EXT: &str = "idx";
pub const LOCK_SUFFIX: &str = "lock";
pub const CREATION_SUFFIX: &str = "atmp";

/// Length of a transaction id
pub const TRANSACTION_ID_LEN: usize = 8;

const TRANSACTION_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Which record a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    /// An account ledger entry
    Account(AccountId),
    /// The account-number allocator
    Index,
}

impl RecordKey {
    /// Base name without the extension; also the lock file's stem
    pub fn stem(&self) -> String {
        match self {
            RecordKey::Account(id) => id.to_string(),
            RecordKey::Index => INDEX_STEM.to_string(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            RecordKey::Account(_) => ACCOUNT_EXT,
            RecordKey::Index => INDEX_EXT,
        }
    }

    /// `<id>.txt` or `index.idx`
    pub fn base_name(&self) -> String {
        format!("{}.{}", self.stem(), self.extension())
    }

    /// `<stem>.lock`
    pub fn lock_name(&self) -> String {
        format!("{}.{}", self.stem(), LOCK_SUFFIX)
    }

    /// `<stem>_<txn>.<ext>.<suffix>`
    pub fn shadow_name(&self, txn: &TransactionId, protocol: Protocol, kind: ShadowKind) -> String {
        format!(
            "{}_{}.{}.{}",
            self.stem(),
            txn,
            self.extension(),
            protocol.suffix(kind)
        )
    }

    /// Account id, if this is an account record
    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            RecordKey::Account(id) => Some(*id),
            RecordKey::Index => None,
        }
    }

    fn from_stem(stem: &str) -> Option<Self> {
        if stem == INDEX_STEM {
            return Some(RecordKey::Index);
        }
        parse_account_id(stem).map(RecordKey::Account)
    }

    fn from_stem_and_ext(stem: &str, ext: &str) -> Option<Self> {
        let key = Self::from_stem(stem)?;
        (key.extension() == ext).then_some(key)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Account(id) => write!(f, "account {}", id),
            RecordKey::Index => write!(f, "index"),
        }
    }
}

/// Canonical decimal account id: digits only, no leading zero, non-zero
fn parse_account_id(s: &str) -> Option<AccountId> {
    if s.is_empty() || s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Which write protocol produced a shadow file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Single-record update (deposit, withdraw, id allocation)
    Update,
    /// One side of a two-record transfer
    Transfer,
}

impl Protocol {
    pub fn suffix(&self, kind: ShadowKind) -> &'static str {
        match (self, kind) {
            (Protocol::Update, ShadowKind::Temp) => "tmp",
            (Protocol::Update, ShadowKind::Old) => "old",
            (Protocol::Transfer, ShadowKind::Temp) => "xtmp",
            (Protocol::Transfer, ShadowKind::Old) => "xold",
        }
    }

    fn from_suffix(suffix: &str) -> Option<(Self, ShadowKind)> {
        match suffix {
            "tmp" => Some((Protocol::Update, ShadowKind::Temp)),
            "old" => Some((Protocol::Update, ShadowKind::Old)),
            "xtmp" => Some((Protocol::Transfer, ShadowKind::Temp)),
            "xold" => Some((Protocol::Transfer, ShadowKind::Old)),
            _ => None,
        }
    }
}

/// New-content staging file or previous-content backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowKind {
    Temp,
    Old,
}

/// Token correlating the shadow files of one logical transaction
///
/// Eight characters from `[A-Z0-9]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a random id
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..TRANSACTION_ID_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..TRANSACTION_ID_CHARSET.len());
                TRANSACTION_ID_CHARSET[idx] as char
            })
            .collect();
        TransactionId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_well_formed(s: &str) -> bool {
        s.len() == TRANSACTION_ID_LEN
            && s.bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }
}

impl FromStr for TransactionId {
    type Err = LedgerError;

    /// Accept a caller-supplied override
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_well_formed(s) {
            Ok(TransactionId(s.to_string()))
        } else {
            Err(LedgerError::InvalidTransactionId {
                value: s.to_string(),
            })
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file name in the data directory, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// A committed record
    Base(RecordKey),
    /// A record lock
    Lock(RecordKey),
    /// A staging or backup file of an in-flight update
    Shadow {
        key: RecordKey,
        txn: TransactionId,
        protocol: Protocol,
        kind: ShadowKind,
    },
    /// A new account file that was never renamed into place
    Creation(AccountId),
}

impl Artifact {
    /// Classify a file name
    ///
    /// Returns `None` for any name the store would not have produced.
    pub fn parse(name: &str) -> Option<Self> {
        let (head, suffix) = name.rsplit_once('.')?;

        let artifact = if suffix == LOCK_SUFFIX {
            Artifact::Lock(RecordKey::from_stem(head)?)
        } else if suffix == CREATION_SUFFIX {
            let id = head
                .strip_suffix(ACCOUNT_EXT)
                .and_then(|s| s.strip_suffix('.'))
                .and_then(parse_account_id)?;
            Artifact::Creation(id)
        } else if let Some((protocol, kind)) = Protocol::from_suffix(suffix) {
            let (stem_txn, ext) = head.rsplit_once('.')?;
            let (stem, txn) = stem_txn.rsplit_once('_')?;
            let txn = txn.parse::<TransactionId>().ok()?;
            let key = RecordKey::from_stem_and_ext(stem, ext)?;
            Artifact::Shadow {
                key,
                txn,
                protocol,
                kind,
            }
        } else {
            Artifact::Base(RecordKey::from_stem_and_ext(head, suffix)?)
        };

        // Reject anything that only parsed loosely.
        (artifact.file_name() == name).then_some(artifact)
    }

    /// The file name this artifact is stored under
    pub fn file_name(&self) -> String {
        match self {
            Artifact::Base(key) => key.base_name(),
            Artifact::Lock(key) => key.lock_name(),
            Artifact::Shadow {
                key,
                txn,
                protocol,
                kind,
            } => key.shadow_name(txn, *protocol, *kind),
            Artifact::Creation(id) => creation_name(*id),
        }
    }

    /// The record this artifact belongs to
    pub fn key(&self) -> RecordKey {
        match self {
            Artifact::Base(key) | Artifact::Lock(key) => *key,
            Artifact::Shadow { key, .. } => *key,
            Artifact::Creation(id) => RecordKey::Account(*id),
        }
    }
}

/// `<id>.txt.atmp`
pub fn creation_name(id: AccountId) -> String {
    format!("{}.{}.{}", id, ACCOUNT_EXT, CREATION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn txn(s: &str) -> TransactionId {
        s.parse().unwrap()
    }

    #[rstest]
    #[case::account_base("70.txt", Artifact::Base(RecordKey::Account(70)))]
    #[case::index_base("index.idx", Artifact::Base(RecordKey::Index))]
    #[case::account_lock("70.lock", Artifact::Lock(RecordKey::Account(70)))]
    #[case::index_lock("index.lock", Artifact::Lock(RecordKey::Index))]
    #[case::creation("12.txt.atmp", Artifact::Creation(12))]
    #[case::update_tmp(
        "100_AB12CD34.txt.tmp",
        Artifact::Shadow { key: RecordKey::Account(100), txn: txn("AB12CD34"), protocol: Protocol::Update, kind: ShadowKind::Temp }
    )]
    #[case::update_old(
        "index_ZZZZ0000.idx.old",
        Artifact::Shadow { key: RecordKey::Index, txn: txn("ZZZZ0000"), protocol: Protocol::Update, kind: ShadowKind::Old }
    )]
    #[case::transfer_tmp(
        "2000_AAAAAAAB.txt.xtmp",
        Artifact::Shadow { key: RecordKey::Account(2000), txn: txn("AAAAAAAB"), protocol: Protocol::Transfer, kind: ShadowKind::Temp }
    )]
    #[case::transfer_old(
        "20_AAAAAAAB.txt.xold",
        Artifact::Shadow { key: RecordKey::Account(20), txn: txn("AAAAAAAB"), protocol: Protocol::Transfer, kind: ShadowKind::Old }
    )]
    fn test_parse_known_artifacts(#[case] name: &str, #[case] expected: Artifact) {
        let parsed = Artifact::parse(name);
        assert_eq!(parsed, Some(expected));
        assert_eq!(parsed.unwrap().file_name(), name);
    }

    #[rstest]
    #[case::unrelated("notes.md")]
    #[case::no_extension("70")]
    #[case::leading_zero("070.txt")]
    #[case::zero_id("0.txt")]
    #[case::wrong_ext_for_account("70.idx")]
    #[case::wrong_ext_for_index("index.txt")]
    #[case::lowercase_txn("70_ab12cd34.txt.tmp")]
    #[case::short_txn("70_AB12.txt.tmp")]
    #[case::missing_txn("70.txt.tmp")]
    #[case::unknown_suffix("70_AB12CD34.txt.bak")]
    #[case::extra_underscore("7_0_AB12CD34.txt.tmp")]
    #[case::shadow_of_index_with_txt("index_AB12CD34.txt.tmp")]
    #[case::creation_of_index("index.idx.atmp")]
    #[case::empty_lock(".lock")]
    #[case::negative_id("-1.txt")]
    fn test_parse_rejects_foreign_names(#[case] name: &str) {
        assert_eq!(Artifact::parse(name), None);
    }

    #[test]
    fn test_record_key_names() {
        let key = RecordKey::Account(42);
        let t = txn("T0T0T0T0");
        assert_eq!(key.base_name(), "42.txt");
        assert_eq!(key.lock_name(), "42.lock");
        assert_eq!(
            key.shadow_name(&t, Protocol::Update, ShadowKind::Temp),
            "42_T0T0T0T0.txt.tmp"
        );
        assert_eq!(
            key.shadow_name(&t, Protocol::Transfer, ShadowKind::Old),
            "42_T0T0T0T0.txt.xold"
        );
        assert_eq!(RecordKey::Index.base_name(), "index.idx");
        assert_eq!(RecordKey::Index.lock_name(), "index.lock");
    }

    #[test]
    fn test_suffixes_are_distinct() {
        let suffixes = [
            Protocol::Update.suffix(ShadowKind::Temp),
            Protocol::Update.suffix(ShadowKind::Old),
            Protocol::Transfer.suffix(ShadowKind::Temp),
            Protocol::Transfer.suffix(ShadowKind::Old),
            LOCK_SUFFIX,
            CREATION_SUFFIX,
        ];
        for (i, a) in suffixes.iter().enumerate() {
            for b in &suffixes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_generated_transaction_id_is_well_formed() {
        for _ in 0..100 {
            let id = TransactionId::generate();
            assert_eq!(id.as_str().len(), TRANSACTION_ID_LEN);
            assert!(id.as_str().parse::<TransactionId>().is_ok());
        }
    }

    #[rstest]
    #[case::ok("AAAAAAAA", true)]
    #[case::digits("12345678", true)]
    #[case::too_long("AAAAAAAAA", false)]
    #[case::lowercase("aaaaaaaa", false)]
    #[case::punctuation("AAAA-AAA", false)]
    fn test_transaction_id_override(#[case] value: &str, #[case] valid: bool) {
        let parsed = value.parse::<TransactionId>();
        assert_eq!(parsed.is_ok(), valid);
        if !valid {
            assert!(matches!(
                parsed.unwrap_err(),
                LedgerError::InvalidTransactionId { .. }
            ));
        }
    }
}
