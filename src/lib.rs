//! Drove Ledger Library
//! # Overview
//!
//! A file-per-account ledger whose updates survive a crash at any point.
//! Each account lives in `<id>.txt` inside one data directory; every change
//! is staged in a shadow file and committed with atomic renames, and a
//! recovery scan run at startup returns every record to exactly its pre- or
//! post-update content.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, LedgerError, etc.)
//! - [`config`] - Data directory and lock wait settings
//! - [`storage`] - The on-disk protocol:
//!   - [`storage::naming`] - Typed artifact names and a strict parser
//!   - [`storage::lock`] - Exclusive-create lock files with a bounded wait
//!   - [`storage::record_store`] - The single-record replace protocol and its recovery rule
//! - [`core`] - Account operations:
//!   - [`core::transfer`] - Two-record transfers sharing one transaction id
//!   - [`core::recovery`] - The startup recovery scan
//!   - [`core::ledger`] - The facade used by the CLI
//! - [`io`] - CSV encoding of records and listings
//! - [`cli`] - CLI arguments parsing and dispatch
//!
//! # Update states
//!
//! | State | Action |
//! |-------|--------|
//! | S0 | lock file created |
//! | S1 | base copied to temp |
//! | S2 | temp overwritten with new content, synced |
//! | S3 | base renamed to old shadow |
//! | S4 | temp renamed onto base |
//! | S5 | old shadow deleted, lock removed |

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod storage;
pub mod types;

pub use config::{LockConfig, StoreConfig};
pub use core::{Ledger, RecoveryReport, RecoveryScanner, TransferCoordinator, TransferReceipt};
pub use io::write_accounts_csv;
pub use types::{Account, AccountId, LedgerError, ValidationIssue};
