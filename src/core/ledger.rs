//! Ledger facade
//!
//! [`Ledger::open`] is the startup path: the recovery scan runs first, and
//! only then is `index.idx` created if it is missing. Creating the index first
//! could reset the allocator when a crash left it between S3 and S4 of an id
//! allocation.
//!
//! [`Ledger::attach`] joins a directory other processes may be writing to.
//! It never scans, because every lock it finds may belong to a live writer.

use crate::config::StoreConfig;
use crate::core::account_manager::AccountManager;
use crate::core::index::AccountIndex;
use crate::core::recovery::{RecoveryReport, RecoveryScanner};
use crate::core::transfer::{TransferCoordinator, TransferReceipt};
use crate::types::{Account, AccountId, LedgerError};
use log::info;
use rust_decimal::Decimal;

/// A recovered, ready-to-use data directory
#[derive(Debug)]
pub struct Ledger {
    config: StoreConfig,
    accounts: AccountManager,
    index: AccountIndex,
    transfers: TransferCoordinator,
    last_recovery: Option<RecoveryReport>,
}

impl Ledger {
    /// Recover the ledger in `config.data_dir` and open it
    ///
    /// Only safe while no other process is working on the directory.
    ///
    /// # Errors
    ///
    /// - `DataDirMissing` if the directory does not exist
    /// - any error from the recovery scan
    pub fn open(config: StoreConfig) -> Result<Self, LedgerError> {
        check_dir(&config)?;
        let report = RecoveryScanner::new(config.data_dir()).run()?;
        Self::build(config, Some(report))
    }

    /// Open the ledger in `config.data_dir` without recovering it
    ///
    /// Leftover lock files are treated as held; run [`Ledger::open`] or
    /// [`Ledger::recover`] once all writers are gone to clear them.
    pub fn attach(config: StoreConfig) -> Result<Self, LedgerError> {
        check_dir(&config)?;
        Self::build(config, None)
    }

    fn build(
        config: StoreConfig,
        last_recovery: Option<RecoveryReport>,
    ) -> Result<Self, LedgerError> {
        let dir = config.data_dir();
        let index = AccountIndex::new(dir, config.lock.clone());
        index.ensure()?;
        info!("ledger open at {}", dir.display());

        Ok(Ledger {
            accounts: AccountManager::new(&config),
            transfers: TransferCoordinator::new(&config),
            index,
            last_recovery,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The report of the scan run by [`Ledger::open`] or [`Ledger::recover`]
    ///
    /// `None` for a ledger that was attached and never recovered.
    pub fn last_recovery(&self) -> Option<&RecoveryReport> {
        self.last_recovery.as_ref()
    }

    /// Run the recovery scan
    pub fn recover(&mut self) -> Result<&RecoveryReport, LedgerError> {
        let report = RecoveryScanner::new(self.config.data_dir()).run()?;
        Ok(self.last_recovery.insert(report))
    }

    pub fn create_account(
        &self,
        first_name: &str,
        last_name: &str,
        starting_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        self.accounts
            .create(&self.index, first_name, last_name, starting_balance)
    }

    /// Returns the new balance
    pub fn deposit(&self, id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.accounts.deposit(id, amount)
    }

    /// Returns the new balance
    pub fn withdraw(&self, id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.accounts.withdraw(id, amount)
    }

    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError> {
        self.transfers.transfer(from, to, amount)
    }

    pub fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts.get(id)
    }

    /// All accounts, sorted by id
    pub fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.accounts.get_all_accounts()
    }

    /// The last id handed out
    pub fn last_id(&self) -> Result<AccountId, LedgerError> {
        self.index.current()
    }
}

fn check_dir(config: &StoreConfig) -> Result<(), LedgerError> {
    let dir = config.data_dir();
    if !dir.is_dir() {
        return Err(LedgerError::data_dir_missing(dir));
    }
    Ok(())
}
