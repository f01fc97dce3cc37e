//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account state and identifiers
//! - `error`: Error types for the ledger

pub mod account;
pub mod error;

pub use account::{Account, AccountId};
pub use error::{LedgerError, ValidationIssue};
