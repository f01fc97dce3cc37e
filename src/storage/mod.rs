//! Storage layer
//!
//! Everything that touches the data directory's namespace:
//! - `naming` - Typed artifact names and their strict parser
//! - `listing` - One-pass classification of a directory
//! - `lock` - Exclusive-create lock files with a bounded wait
//! - `record_store` - The single-record replace protocol and its recovery rule

pub mod listing;
pub mod lock;
pub mod naming;
pub mod record_store;

pub use listing::DirListing;
pub use lock::LockGuard;
pub use naming::{Artifact, Protocol, RecordKey, ShadowKind, TransactionId};
pub use record_store::{
    record_exists, LockRecovery, RecordOutcome, RecordRecovery, RecordStore, RecoveryPolicy,
    ShadowState,
};
