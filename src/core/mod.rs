//! Core ledger logic
//!
//! This module contains the account operations built on the storage layer:
//! - `validation` - Argument checks run before any lock is taken
//! - `index` - The account number allocator
//! - `account_manager` - Account creation, lookup, deposits and withdrawals
//! - `transfer` - Two-record transfers sharing one transaction id
//! - `recovery` - The startup recovery scan
//! - `ledger` - The facade that recovers a directory and exposes the operations

pub mod account_manager;
pub mod index;
pub mod ledger;
pub mod recovery;
pub mod transfer;
pub mod validation;

pub use account_manager::AccountManager;
pub use index::AccountIndex;
pub use ledger::Ledger;
pub use recovery::{find_pairs, RecoveryReport, RecoveryScanner, TransferRecovery};
pub use transfer::{PreparedTransfer, TransferCoordinator, TransferReceipt};
pub use validation::Validation;
