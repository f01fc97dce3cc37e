//! Argument validation
//!
//! Checks run before any lock is taken. Every failing check adds an issue to
//! a per-call list, and [`Validation::finish`] turns a non-empty list into
//! `LedgerError::Validation`.

use crate::storage::{record_exists, RecordKey};
use crate::types::{AccountId, LedgerError, ValidationIssue};
use log::warn;
use rust_decimal::Decimal;
use std::path::Path;

/// Issues collected for one call
#[derive(Debug, Default)]
#[must_use]
pub struct Validation {
    issues: Vec<ValidationIssue>,
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount must not be negative
    pub fn amount(mut self, amount: Decimal) -> Self {
        if amount < Decimal::ZERO {
            self.issues.push(ValidationIssue::NegativeAmount { amount });
        }
        self
    }

    /// Name field must contain something other than whitespace
    pub fn name(mut self, field: &'static str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.issues.push(ValidationIssue::EmptyName { field });
        }
        self
    }

    /// Account must have a record in `dir`
    pub fn account_exists(mut self, dir: &Path, id: AccountId) -> Self {
        if !record_exists(dir, RecordKey::Account(id)) {
            self.issues.push(ValidationIssue::UnknownAccount { id });
        }
        self
    }

    /// Transfer endpoints must differ
    pub fn distinct(mut self, from: AccountId, to: AccountId) -> Self {
        if from == to {
            self.issues.push(ValidationIssue::SameAccount { id: from });
        }
        self
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// `Ok` if nothing was rejected
    pub fn finish(self, operation: &str) -> Result<(), LedgerError> {
        if self.issues.is_empty() {
            return Ok(());
        }
        let err = LedgerError::Validation(self.issues);
        warn!("{} rejected: {}", operation, err);
        Err(err)
    }
}
