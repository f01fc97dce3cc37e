//! Two-record transfers
//!
//! A transfer is two coupled [`RecordStore`] updates that share one
//! transaction id and use the transfer shadow suffixes (`xtmp`/`xold`), so
//! recovery can tell the two sides belong together.
//!
//! Protocol:
//! 1. Validate the amount and both ids; nothing is touched on failure.
//! 2. Lock both records, smaller id first.
//! 3. Stage both records (S1), read both balances.
//! 4. On insufficient funds discard both temps and release both locks.
//! 5. Write both temps (S2).
//! 6. Commit `from` (S3+S4), then `to`.
//! 7. Delete both old shadows, release both locks.
//!
//! Between the two commits in step 6 one side may be committed while the
//! other is not. Recovery restores each side on its own; it does not
//! reconcile the pair. A failure after either side reached S3 therefore
//! leaves both sides on disk exactly as a crash would, so recovery still
//! sees a pair.

use crate::config::{LockConfig, StoreConfig};
use crate::core::validation::Validation;
use crate::io::csv_format::{decode_account, encode_account};
use crate::storage::{LockGuard, Protocol, RecordKey, RecordStore, TransactionId};
use crate::types::{Account, AccountId, LedgerError};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Coordinates transfers in one data directory
#[derive(Debug, Clone)]
pub struct TransferCoordinator {
    dir: PathBuf,
    lock: LockConfig,
}

/// Balances after a completed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub txn: TransactionId,
    pub amount: Decimal,
    pub from: Account,
    pub to: Account,
}

/// One locked, staged side of a transfer
#[derive(Debug)]
struct Side {
    store: RecordStore,
    guard: LockGuard,
    after: Account,
}

impl Side {
    fn abort(self, err: LedgerError) -> LedgerError {
        self.store.abort(self.guard, err)
    }

    /// Whether S3 ran on this side
    fn retired(&self) -> bool {
        self.store.old_path().exists()
    }

    /// Keep the lock and every shadow for recovery
    fn abandon(self) -> PathBuf {
        self.guard.abandon()
    }
}

/// A transfer with both temps written and both locks held
///
/// Dropping it without [`PreparedTransfer::finish`] or
/// [`PreparedTransfer::abort`] releases the locks but leaves the shadow
/// files for recovery.
#[derive(Debug)]
pub struct PreparedTransfer {
    txn: TransactionId,
    amount: Decimal,
    from: Side,
    to: Side,
}

impl TransferCoordinator {
    pub fn new(config: &StoreConfig) -> Self {
        TransferCoordinator {
            dir: config.data_dir.clone(),
            lock: config.lock.clone(),
        }
    }

    /// Move `amount` from `from` to `to` under a fresh transaction id
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError> {
        self.transfer_with_txn(from, to, amount, TransactionId::generate())
    }

    /// Move `amount` from `from` to `to` under `txn`
    pub fn transfer_with_txn(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        txn: TransactionId,
    ) -> Result<TransferReceipt, LedgerError> {
        let prepared = self.prepare(from, to, amount, txn)?;
        if let Err(e) = prepared.commit_from().and_then(|()| prepared.commit_to()) {
            return Err(prepared.abort(e));
        }
        prepared.finish()
    }

    /// Run steps 1 to 5: validate, lock, stage and write both sides
    ///
    /// # Errors
    ///
    /// - `Validation` for a negative amount, an unknown id, or `from == to`
    /// - `InsufficientFunds` if `from` holds less than `amount`; both locks
    ///   are released and no shadow files remain
    /// - `LockTimeout` if either lock cannot be taken
    pub fn prepare(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        txn: TransactionId,
    ) -> Result<PreparedTransfer, LedgerError> {
        Validation::new()
            .amount(amount)
            .account_exists(&self.dir, from)
            .account_exists(&self.dir, to)
            .distinct(from, to)
            .finish("transfer")?;

        let open = |id| {
            RecordStore::open_with_txn(
                &self.dir,
                RecordKey::Account(id),
                Protocol::Transfer,
                txn.clone(),
            )
        };
        let from_store = open(from)?;
        let to_store = open(to)?;

        // Canonical order: the smaller id is always locked first.
        let (from_guard, to_guard) = if from < to {
            let a = from_store.lock(&self.lock)?;
            let b = to_store.lock(&self.lock)?;
            (a, b)
        } else {
            let b = to_store.lock(&self.lock)?;
            let a = from_store.lock(&self.lock)?;
            (a, b)
        };
        debug!("transfer txn {} locked accounts {} and {}", txn, from, to);

        let staged = stage_and_compute(
            (from, to),
            &from_store,
            &from_guard,
            &to_store,
            &to_guard,
            amount,
        );
        let (from_after, to_after) = match staged {
            Ok(accounts) => accounts,
            Err(e) => {
                let e = from_store.abort(from_guard, e);
                return Err(to_store.abort(to_guard, e));
            }
        };

        Ok(PreparedTransfer {
            txn,
            amount,
            from: Side {
                store: from_store,
                guard: from_guard,
                after: from_after,
            },
            to: Side {
                store: to_store,
                guard: to_guard,
                after: to_after,
            },
        })
    }
}

/// S1 on both sides, balance check, then S2 on both sides
///
/// Returns both accounts as they will read once committed.
fn stage_and_compute(
    ids: (AccountId, AccountId),
    from_store: &RecordStore,
    from_guard: &LockGuard,
    to_store: &RecordStore,
    to_guard: &LockGuard,
    amount: Decimal,
) -> Result<(Account, Account), LedgerError> {
    from_store.stage(from_guard)?;
    to_store.stage(to_guard)?;

    let from = read_account(ids.0, from_store)?;
    let to = read_account(ids.1, to_store)?;

    if from.balance < amount {
        warn!(
            "account {} trying to transfer {} with balance {}",
            from.id, amount, from.balance
        );
        return Err(LedgerError::insufficient_funds(from.id, from.balance, amount));
    }
    let from_balance = from
        .balance
        .checked_sub(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("transfer", from.id))?;
    let to_balance = to
        .balance
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("transfer", to.id))?;

    let from = from.with_balance(from_balance);
    let to = to.with_balance(to_balance);
    from_store.write_staged(from_guard, &encode_account(&from)?)?;
    to_store.write_staged(to_guard, &encode_account(&to)?)?;
    Ok((from, to))
}

fn read_account(id: AccountId, store: &RecordStore) -> Result<Account, LedgerError> {
    decode_account(id, &store.read()?, store.base_path())
}

impl PreparedTransfer {
    pub fn txn(&self) -> &TransactionId {
        &self.txn
    }

    /// Step 6, first half: commit the debited side
    pub fn commit_from(&self) -> Result<(), LedgerError> {
        self.from.store.commit(&self.from.guard)
    }

    /// Step 6, second half: commit the credited side
    pub fn commit_to(&self) -> Result<(), LedgerError> {
        self.to.store.commit(&self.to.guard)
    }

    /// Step 7: delete both old shadows and release both locks
    pub fn finish(self) -> Result<TransferReceipt, LedgerError> {
        let PreparedTransfer {
            txn,
            amount,
            from,
            to,
        } = self;

        from.store.finish(&from.guard)?;
        to.store.finish(&to.guard)?;
        from.guard.release()?;
        to.guard.release()?;

        info!(
            "transfer {} from account {} to account {} (txn {}), balances {} and {}",
            amount, from.after.id, to.after.id, txn, from.after.balance, to.after.balance
        );
        Ok(TransferReceipt {
            txn,
            amount,
            from: from.after,
            to: to.after,
        })
    }

    /// Clean up both sides after a failed step and hand back the error
    ///
    /// Before either side reaches S3 both are discarded and unlocked. From S3
    /// on, both locks and all four shadows stay so recovery resolves the pair
    /// together.
    pub fn abort(self, err: LedgerError) -> LedgerError {
        error!("transfer txn {} failed: {}", self.txn, err);
        if self.from.retired() || self.to.retired() {
            let from_lock = self.from.abandon();
            let to_lock = self.to.abandon();
            warn!(
                "transfer txn {} keeping {} and {} for recovery",
                self.txn,
                from_lock.display(),
                to_lock.display()
            );
            return err;
        }
        let err = self.from.abort(err);
        self.to.abort(err)
    }
}
