//! Account-related types for the ledger
//!
//! This module defines the Account structure persisted in each record file
//! and the identifier type used to derive record paths.

use rust_decimal::Decimal;

/// Account identifier
///
/// Positive integers allocated by the account index. The record file for
/// account `n` lives at `<dir>/n.txt`.
pub type AccountId = u64;

/// Ledger account state
///
/// The business fields stored in a record file, plus the id the file name
/// was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// The account id (taken from the record file name, not its content)
    pub id: AccountId,

    /// Account holder's first name
    pub first_name: String,

    /// Account holder's last name
    pub last_name: String,

    /// Current balance
    ///
    /// Never negative for accounts written through the ledger: withdrawals
    /// and transfers re-check it under the record lock.
    pub balance: Decimal,
}

impl Account {
    /// Create a new account value
    ///
    /// # Arguments
    ///
    /// * `id` - The account id
    /// * `first_name` - Holder's first name
    /// * `last_name` - Holder's last name
    /// * `balance` - Starting balance
    pub fn new(
        id: AccountId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Account {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            balance,
        }
    }

    /// Return a copy of this account with a different balance
    pub fn with_balance(&self, balance: Decimal) -> Self {
        Account {
            balance,
            ..self.clone()
        }
    }
}
