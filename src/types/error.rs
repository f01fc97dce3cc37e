//! Error types for the ledger
//!
//! This module defines all error types that can occur while reading, updating,
//! or recovering record files. Errors are designed to be descriptive and
//! user-friendly for CLI output.
//!
//! # Error Categories
//!
//! - **Validation Errors**: Negative amounts, empty names, unknown accounts.
//!   Rejected before any lock is taken.
//! - **Business-Rule Errors**: Insufficient funds, found under the lock.
//! - **Environment Errors**: Missing data directory or record file. Fatal.
//! - **Storage Errors**: Lock timeouts, I/O failures, malformed record content.

use crate::types::AccountId;
use rust_decimal::Decimal;
use std::path::Path;
use thiserror::Error;

/// A single rejected argument
///
/// Validation collects every issue for a call instead of stopping at the
/// first one, so callers can report them all at once.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    /// Amount is below zero
    #[error("amount cannot be negative: {amount}")]
    NegativeAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// A name field is empty or only whitespace
    #[error("{field} cannot be empty")]
    EmptyName {
        /// Which field was empty
        field: &'static str,
    },

    /// Transfer source and destination are the same account
    #[error("cannot transfer from account {id} to itself")]
    SameAccount {
        /// The repeated account id
        id: AccountId,
    },

    /// No record file exists for the account
    #[error("account id is not valid: {id}")]
    UnknownAccount {
        /// The requested account id
        id: AccountId,
    },
}

/// Main error type for the ledger
///
/// This enum represents all possible errors that can occur during ledger
/// operations. Each variant includes relevant context to help diagnose and
/// resolve the issue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// One or more arguments were rejected before any file was touched
    #[error("{}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// Balance is too low for the requested withdrawal or transfer
    ///
    /// The record is left unchanged and its lock is released.
    #[error("Insufficient funds in account {id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account id
        id: AccountId,
        /// Stored balance
        balance: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation} for account {id}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Account id
        id: AccountId,
    },

    /// The data directory does not exist
    ///
    /// This is a fatal setup error.
    #[error("Data directory not found: {path}")]
    DataDirMissing {
        /// The configured directory
        path: String,
    },

    /// A record file expected at construction is missing
    ///
    /// This is a fatal setup error.
    #[error("Record file not found: {path}")]
    RecordNotFound {
        /// The expected record path
        path: String,
    },

    /// A new account id already has a record file
    ///
    /// Only possible if the index was reset or edited by hand.
    #[error("Account {id} already exists")]
    AccountExists {
        /// The allocated id
        id: AccountId,
    },

    /// A lock file could not be created within the configured timeout
    #[error("Timed out after {waited_ms} ms waiting for lock {path}")]
    LockTimeout {
        /// The lock file path
        path: String,
        /// How long the caller waited
        waited_ms: u128,
    },

    /// Record content could not be decoded
    #[error("Malformed record {path}: {message}")]
    MalformedRecord {
        /// The record path
        path: String,
        /// Description of the decoding failure
        message: String,
    },

    /// A transaction id override is not 8 characters of `[A-Z0-9]`
    #[error("Invalid transaction id '{value}'")]
    InvalidTransactionId {
        /// The rejected value
        value: String,
    },

    /// I/O error occurred while reading, writing, or renaming files
    #[error("I/O error{}: {message}", context.as_ref().map(|c| format!(" ({})", c)).unwrap_or_default())]
    Io {
        /// The operation and path, when known
        context: Option<String>,
        /// Description of the I/O error
        message: String,
    },
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// Conversion from io::Error to LedgerError
impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            context: None,
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to LedgerError
impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        LedgerError::MalformedRecord {
            path: String::new(),
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an Io error carrying the failed operation and path
    pub fn io(operation: &str, path: &Path, error: std::io::Error) -> Self {
        LedgerError::Io {
            context: Some(format!("{} {}", operation, path.display())),
            message: error.to_string(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(id: AccountId, balance: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            id,
            balance,
            requested,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, id: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            id,
        }
    }

    /// Create a DataDirMissing error
    pub fn data_dir_missing(path: &Path) -> Self {
        LedgerError::DataDirMissing {
            path: path.display().to_string(),
        }
    }

    /// Create a RecordNotFound error
    pub fn record_not_found(path: &Path) -> Self {
        LedgerError::RecordNotFound {
            path: path.display().to_string(),
        }
    }

    /// Create a LockTimeout error
    pub fn lock_timeout(path: &Path, waited: std::time::Duration) -> Self {
        LedgerError::LockTimeout {
            path: path.display().to_string(),
            waited_ms: waited.as_millis(),
        }
    }

    /// Create a MalformedRecord error
    pub fn malformed_record(path: &Path, message: impl Into<String>) -> Self {
        LedgerError::MalformedRecord {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Create a Validation error holding a single issue
    pub fn validation(issue: ValidationIssue) -> Self {
        LedgerError::Validation(vec![issue])
    }

    /// Whether this error was raised before any lock was taken
    pub fn is_validation(&self) -> bool {
        matches!(self, LedgerError::Validation(_))
    }
}
