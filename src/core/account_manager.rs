//! Account management module
//!
//! This module provides the `AccountManager` struct which reads account
//! records and applies single-record balance changes through the
//! [`RecordStore`] update protocol.
//!
//! The AccountManager is responsible for:
//! - Creating accounts with a write-then-rename of a staging file
//! - Validating deposit and withdrawal arguments before any lock is taken
//! - Re-checking the stored balance under the record lock
//! - Reading one account or listing all of them (unlocked reads)

use crate::config::{LockConfig, StoreConfig};
use crate::core::index::AccountIndex;
use crate::core::validation::Validation;
use crate::io::csv_format::{decode_account, encode_account};
use crate::storage::naming::creation_name;
use crate::storage::{DirListing, Protocol, RecordKey, RecordStore};
use crate::types::{Account, AccountId, LedgerError};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Manages account records in one data directory
#[derive(Debug, Clone)]
pub struct AccountManager {
    dir: PathBuf,
    lock: LockConfig,
}

impl AccountManager {
    /// Create a new AccountManager for the configured directory
    pub fn new(config: &StoreConfig) -> Self {
        AccountManager {
            dir: config.data_dir.clone(),
            lock: config.lock.clone(),
        }
    }

    /// Path of the record file for `id`
    pub fn record_path(&self, id: AccountId) -> PathBuf {
        self.dir.join(RecordKey::Account(id).base_name())
    }

    /// Check if an account record exists
    pub fn exists(&self, id: AccountId) -> bool {
        self.record_path(id).is_file()
    }

    /// Read an account without taking its lock
    ///
    /// # Errors
    ///
    /// - `Validation(UnknownAccount)` if there is no record for `id`
    /// - `MalformedRecord` if the record cannot be decoded
    pub fn get(&self, id: AccountId) -> Result<Account, LedgerError> {
        Validation::new()
            .account_exists(&self.dir, id)
            .finish("lookup")?;

        let path = self.record_path(id);
        let content = fs::read(&path).map_err(|e| LedgerError::io("read", &path, e))?;
        decode_account(id, &content, &path)
    }

    /// Get all accounts sorted by id
    pub fn get_all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        DirListing::read(&self.dir)?
            .account_ids()
            .into_iter()
            .map(|id| self.get(id))
            .collect()
    }

    /// Create a new account under the next id from `index`
    ///
    /// The record is written to `<id>.txt.atmp`, synced, then renamed onto
    /// `<id>.txt`. A crash before the rename leaves only the staging file,
    /// which recovery deletes.
    ///
    /// # Errors
    ///
    /// - `Validation` if a name is blank or the balance is negative
    /// - `AccountExists` if the allocated id already has a record
    pub fn create(
        &self,
        index: &AccountIndex,
        first_name: &str,
        last_name: &str,
        balance: Decimal,
    ) -> Result<Account, LedgerError> {
        Validation::new()
            .name("first name", first_name)
            .name("last name", last_name)
            .amount(balance)
            .finish("create account")?;

        let id = index.next_id()?;
        let base = self.record_path(id);
        if base.exists() {
            return Err(LedgerError::AccountExists { id });
        }

        let account = Account::new(id, first_name.trim(), last_name.trim(), balance);
        let content = encode_account(&account)?;

        let staging = self.dir.join(creation_name(id));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging)
            .map_err(|e| LedgerError::io("create", &staging, e))?;
        file.write_all(&content)
            .and_then(|()| file.sync_all())
            .map_err(|e| LedgerError::io("write", &staging, e))?;
        drop(file);

        fs::rename(&staging, &base).map_err(|e| LedgerError::io("rename", &staging, e))?;

        info!(
            "created account {} for {} {} with balance {}",
            id, account.first_name, account.last_name, balance
        );
        Ok(account)
    }

    /// Deposit funds into an account
    ///
    /// # Returns
    ///
    /// The balance after the deposit
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The amount is negative or the account does not exist
    /// - Adding the amount would overflow
    /// - The lock cannot be acquired or the record cannot be replaced
    pub fn deposit(&self, id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        Validation::new()
            .amount(amount)
            .account_exists(&self.dir, id)
            .finish("deposit")?;

        let balance = self.apply(id, |account| {
            account
                .balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("deposit", id))
        })?;

        // Logged after the commit so an interrupted deposit leaves no line.
        info!("deposit {} to account {}, new balance {}", amount, id, balance);
        Ok(balance)
    }

    /// Withdraw funds from an account
    ///
    /// The balance is checked against the stored value under the lock; an
    /// insufficient balance releases the lock and leaves the record as is.
    ///
    /// # Returns
    ///
    /// The balance after the withdrawal
    pub fn withdraw(&self, id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        Validation::new()
            .amount(amount)
            .account_exists(&self.dir, id)
            .finish("withdraw")?;

        let balance = self.apply(id, |account| {
            if account.balance < amount {
                warn!(
                    "account {} trying to withdraw {} with balance {}",
                    id, amount, account.balance
                );
                return Err(LedgerError::insufficient_funds(id, account.balance, amount));
            }
            account
                .balance
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("withdraw", id))
        })?;

        info!("withdraw {} from account {}, new balance {}", amount, id, balance);
        Ok(balance)
    }

    /// Locked read-modify-write of one account's balance
    fn apply<F>(&self, id: AccountId, f: F) -> Result<Decimal, LedgerError>
    where
        F: FnOnce(&Account) -> Result<Decimal, LedgerError>,
    {
        let store = RecordStore::open(&self.dir, RecordKey::Account(id), Protocol::Update)?;
        let path = store.base_path().to_path_buf();
        debug!("account {} update under txn {}", id, store.txn());

        let written = store.update(&self.lock, |content| {
            let account = decode_account(id, content, &path)?;
            debug!("balance for account {} is {}", id, account.balance);
            let balance = f(&account)?;
            encode_account(&account.with_balance(balance))
        })?;

        Ok(decode_account(id, &written, &path)?.balance)
    }
}
