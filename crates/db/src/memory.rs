//! Transactional in-memory ledger store.
//!
//! Committed state sits behind a read-write lock. A [`MemoryUnitOfWork`]
//! stages account writes and transaction appends privately and applies them
//! under a single write lock on commit, so readers see either none or all of
//! a unit's writes.
//!
//! Ids come from atomic sequences and are never reused. A rolled-back unit
//! leaves gaps, the same way a database sequence does.
//!
//! Units do not isolate concurrent read-modify-write cycles from each other.
//! Writers serialize on the account-number locks of the lock service.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use bank_core::ledger::{
    Account, LedgerError, LedgerTx, NewAccount, NewTransaction, Transaction, TransactionBoundary,
};
use bank_shared::types::{AccountId, TransactionId};
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    transactions: Vec<Transaction>,
}

/// In-memory [`TransactionBoundary`] over accounts and transaction records.
#[derive(Debug)]
pub struct MemoryLedgerStore {
    state: RwLock<LedgerState>,
    next_account_id: AtomicI64,
    next_transaction_id: AtomicI64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    /// Creates an empty store. The first ids handed out are 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            next_account_id: AtomicI64::new(1),
            next_transaction_id: AtomicI64::new(1),
            commits: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
        }
    }

    /// Starts a unit of work.
    #[must_use]
    pub fn begin(&self) -> MemoryUnitOfWork<'_> {
        MemoryUnitOfWork {
            store: self,
            staged: HashMap::new(),
            created: HashSet::new(),
            appended: Vec::new(),
        }
    }

    /// Committed account with `account_number`.
    #[must_use]
    pub fn account(&self, account_number: &str) -> Option<Account> {
        self.state.read().accounts.get(account_number).cloned()
    }

    /// Every committed account, ordered by id.
    #[must_use]
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.state.read().accounts.values().cloned().collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    /// Committed records of one account, in append order.
    #[must_use]
    pub fn transactions_for(&self, account_id: AccountId) -> Vec<Transaction> {
        self.state
            .read()
            .transactions
            .iter()
            .filter(|transaction| transaction.account_id == account_id)
            .cloned()
            .collect()
    }

    /// Number of committed transaction records.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.state.read().transactions.len()
    }

    /// Number of committed accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.state.read().accounts.len()
    }

    /// Sum of every committed balance.
    #[must_use]
    pub fn total_balance(&self) -> Decimal {
        self.state
            .read()
            .accounts
            .values()
            .map(|account| account.balance)
            .sum()
    }

    /// Committed and rolled-back units so far.
    #[must_use]
    pub fn unit_counts(&self) -> (u64, u64) {
        (
            self.commits.load(Ordering::Relaxed),
            self.rollbacks.load(Ordering::Relaxed),
        )
    }

    fn rolled_back(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        debug!("Unit of work rolled back");
    }
}

impl TransactionBoundary for MemoryLedgerStore {
    fn run<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<LedgerError>,
    {
        let mut unit = self.begin();
        match work(&mut unit) {
            Ok(value) => {
                unit.commit().map_err(E::from)?;
                Ok(value)
            }
            Err(err) => {
                self.rolled_back();
                Err(err)
            }
        }
    }

    fn read_only<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn LedgerTx) -> Result<T, E>,
        E: From<LedgerError>,
    {
        work(&self.begin())
    }

    fn run_new<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<LedgerError>,
    {
        // Units never share state, so a nested call is already independent.
        self.run(work)
    }
}

/// Staged writes of one unit of work.
///
/// Dropping the unit without calling [`MemoryUnitOfWork::commit`] discards
/// everything it staged.
#[derive(Debug)]
pub struct MemoryUnitOfWork<'a> {
    store: &'a MemoryLedgerStore,
    staged: HashMap<String, Account>,
    created: HashSet<String>,
    appended: Vec<Transaction>,
}

impl MemoryUnitOfWork<'_> {
    /// Applies every staged write atomically.
    ///
    /// # Errors
    ///
    /// `AccountNumberConflict` if another unit committed one of this unit's
    /// new account numbers first, `AccountNotFound` if an updated account no
    /// longer exists. The store is unchanged in both cases.
    pub fn commit(self) -> Result<(), LedgerError> {
        let mut state = self.store.state.write();

        for number in &self.created {
            if state.accounts.contains_key(number) {
                drop(state);
                self.store.rolled_back();
                return Err(LedgerError::AccountNumberConflict(number.clone()));
            }
        }
        for number in self.staged.keys() {
            if !self.created.contains(number) && !state.accounts.contains_key(number) {
                drop(state);
                self.store.rolled_back();
                return Err(LedgerError::AccountNotFound(number.clone()));
            }
        }

        let accounts = self.staged.len();
        let transactions = self.appended.len();
        state.accounts.extend(self.staged);
        state.transactions.extend(self.appended);
        drop(state);

        self.store.commits.fetch_add(1, Ordering::Relaxed);
        debug!(accounts, transactions, "Unit of work committed");
        Ok(())
    }

    fn exists(&self, account_number: &str) -> bool {
        self.staged.contains_key(account_number)
            || self.store.state.read().accounts.contains_key(account_number)
    }
}

impl LedgerTx for MemoryUnitOfWork<'_> {
    fn find_account_by_number(&self, account_number: &str) -> Result<Option<Account>, LedgerError> {
        if let Some(account) = self.staged.get(account_number) {
            return Ok(Some(account.clone()));
        }
        Ok(self.store.account(account_number))
    }

    fn count_accounts(&self) -> Result<u64, LedgerError> {
        let committed = self.store.account_count() + self.created.len();
        u64::try_from(committed).map_err(|err| LedgerError::PersistenceFailure(err.to_string()))
    }

    fn insert_account(&mut self, account: NewAccount) -> Result<Account, LedgerError> {
        if self.exists(&account.account_number) {
            return Err(LedgerError::AccountNumberConflict(account.account_number));
        }

        let created = Account {
            id: AccountId::new(self.store.next_account_id.fetch_add(1, Ordering::Relaxed)),
            account_number: account.account_number,
            holder_name: account.holder_name,
            balance: account.initial_balance,
            created_at: Utc::now(),
        };
        self.created.insert(created.account_number.clone());
        self.staged
            .insert(created.account_number.clone(), created.clone());
        Ok(created)
    }

    fn save_account(&mut self, account: &Account) -> Result<(), LedgerError> {
        if !self.exists(&account.account_number) {
            return Err(LedgerError::AccountNotFound(account.account_number.clone()));
        }
        self.staged
            .insert(account.account_number.clone(), account.clone());
        Ok(())
    }

    fn save_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction, LedgerError> {
        let appended = Transaction {
            id: TransactionId::new(self.store.next_transaction_id.fetch_add(1, Ordering::Relaxed)),
            account_id: transaction.account_id,
            transaction_type: transaction.transaction_type,
            entry_type: transaction.entry_type,
            amount: transaction.amount,
            description: transaction.description,
            balance_after: transaction.balance_after,
            created_at: Utc::now(),
        };
        self.appended.push(appended.clone());
        Ok(appended)
    }
}
