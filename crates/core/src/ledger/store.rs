//! Persistence ports and the transaction boundary contract.
//!
//! The unit of work is threaded explicitly: a boundary hands its closure a
//! [`LedgerTx`] handle and every persistence call goes through that handle.
//! Nothing is propagated through thread-locals.

use super::account::{Account, NewAccount};
use super::error::LedgerError;
use super::transaction::{NewTransaction, Transaction};

/// Persistence operations available inside a unit of work.
///
/// Reads observe the unit's own uncommitted writes.
pub trait LedgerTx {
    /// Looks an account up by its account number.
    fn find_account_by_number(&self, account_number: &str) -> Result<Option<Account>, LedgerError>;

    /// Counts accounts, including ones inserted by this unit.
    fn count_accounts(&self) -> Result<u64, LedgerError>;

    /// Inserts a new account, assigning its id and creation timestamp.
    ///
    /// # Errors
    ///
    /// `AccountNumberConflict` if the number is already taken.
    fn insert_account(&mut self, account: NewAccount) -> Result<Account, LedgerError>;

    /// Writes back a mutated account.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the account does not exist.
    fn save_account(&mut self, account: &Account) -> Result<(), LedgerError>;

    /// Appends a transaction record, assigning its id and timestamp.
    fn save_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction, LedgerError>;
}

/// Demarcates atomic units of work against the ledger store.
///
/// All writes made through the handle become visible together when the
/// closure returns `Ok`, and are discarded when it returns `Err`.
pub trait TransactionBoundary: Send + Sync {
    /// Runs `work` in a read-write unit of work.
    fn run<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<LedgerError>;

    /// Runs `work` against a read-only view. The handle is shared, so
    /// mutating calls do not compile.
    fn read_only<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn LedgerTx) -> Result<T, E>,
        E: From<LedgerError>;

    /// Runs `work` in a fresh unit that commits independently of any unit
    /// the caller is currently inside.
    fn run_new<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<LedgerError>;
}
