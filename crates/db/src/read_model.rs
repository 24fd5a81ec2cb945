//! Denormalized read model built from domain events.

use async_trait::async_trait;
use bank_core::events::{
    AccountCreatedEvent, ProjectionError, ReadModelProjector, TransactionCreatedEvent,
};
use bank_core::ledger::{EntryType, TransactionType};
use bank_shared::types::{AccountId, TransactionId};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

/// Projected account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReadView {
    /// Internal identifier.
    pub account_id: AccountId,
    /// Account number.
    pub account_number: String,
    /// Name of the account holder.
    pub holder_name: String,
    /// Balance after the newest projected transaction.
    pub balance: Decimal,
    /// Newest transaction reflected in `balance`.
    pub last_transaction_id: Option<TransactionId>,
}

/// Projected transaction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReadView {
    /// Record identifier.
    pub transaction_id: TransactionId,
    /// Account the record belongs to.
    pub account_id: AccountId,
    /// Record classification.
    pub transaction_type: TransactionType,
    /// Debit or credit.
    pub entry_type: EntryType,
    /// Free-text description.
    pub description: String,
    /// Unsigned amount.
    pub amount: Decimal,
    /// Account balance right after the record was applied.
    pub balance_after: Decimal,
}

impl From<&TransactionCreatedEvent> for TransactionReadView {
    fn from(event: &TransactionCreatedEvent) -> Self {
        Self {
            transaction_id: event.transaction_id,
            account_id: event.account_id,
            transaction_type: event.transaction_type,
            entry_type: event.entry_type,
            description: event.description.clone(),
            amount: event.amount,
            balance_after: event.balance_after,
        }
    }
}

/// In-memory [`ReadModelProjector`].
///
/// Events are keyed by their ids, so redelivery is harmless. An account's
/// balance only moves forward: a transaction older than the one already
/// reflected is recorded but does not touch the balance.
#[derive(Debug, Default)]
pub struct ReadModelStore {
    accounts: DashMap<AccountId, AccountReadView>,
    transactions: DashMap<TransactionId, TransactionReadView>,
}

impl ReadModelStore {
    /// Creates an empty read model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Projected account by id.
    #[must_use]
    pub fn account(&self, account_id: AccountId) -> Option<AccountReadView> {
        self.accounts.get(&account_id).map(|view| view.clone())
    }

    /// Projected account by account number.
    #[must_use]
    pub fn account_by_number(&self, account_number: &str) -> Option<AccountReadView> {
        self.accounts
            .iter()
            .find(|view| view.account_number == account_number)
            .map(|view| view.clone())
    }

    /// Every projected account, ordered by id.
    #[must_use]
    pub fn accounts(&self) -> Vec<AccountReadView> {
        let mut views: Vec<_> = self.accounts.iter().map(|view| view.clone()).collect();
        views.sort_by_key(|view| view.account_id);
        views
    }

    /// Projected records of one account, ordered by id.
    #[must_use]
    pub fn transactions_for(&self, account_id: AccountId) -> Vec<TransactionReadView> {
        let mut views: Vec<_> = self
            .transactions
            .iter()
            .filter(|view| view.account_id == account_id)
            .map(|view| view.clone())
            .collect();
        views.sort_by_key(|view| view.transaction_id);
        views
    }

    /// Number of projected transaction records.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

#[async_trait]
impl ReadModelProjector for ReadModelStore {
    async fn apply_account_created(&self, event: &AccountCreatedEvent) -> Result<(), ProjectionError> {
        self.accounts
            .entry(event.account_id)
            .or_insert_with(|| AccountReadView {
                account_id: event.account_id,
                account_number: event.account_number.clone(),
                holder_name: event.holder_name.clone(),
                balance: event.initial_balance,
                last_transaction_id: None,
            });
        debug!(account_id = %event.account_id, "Account projected");
        Ok(())
    }

    async fn apply_transaction_created(
        &self,
        event: &TransactionCreatedEvent,
    ) -> Result<(), ProjectionError> {
        {
            let mut account = self
                .accounts
                .get_mut(&event.account_id)
                .ok_or(ProjectionError::AccountNotProjected(event.account_id))?;
            if account
                .last_transaction_id
                .is_none_or(|last| event.transaction_id > last)
            {
                account.balance = event.balance_after;
                account.last_transaction_id = Some(event.transaction_id);
            }
        }

        self.transactions
            .entry(event.transaction_id)
            .or_insert_with(|| TransactionReadView::from(event));
        debug!(
            transaction_id = %event.transaction_id,
            account_id = %event.account_id,
            "Transaction projected"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account_created() -> AccountCreatedEvent {
        AccountCreatedEvent {
            account_id: AccountId::new(1),
            account_number: "1000".into(),
            holder_name: "Alice".into(),
            initial_balance: dec!(100.00),
        }
    }

    fn debit(id: i64, amount: Decimal, balance_after: Decimal) -> TransactionCreatedEvent {
        TransactionCreatedEvent {
            transaction_id: TransactionId::new(id),
            account_id: AccountId::new(1),
            transaction_type: TransactionType::Transfer,
            entry_type: EntryType::Debit,
            description: "Transfer From".into(),
            amount,
            balance_after,
        }
    }

    #[tokio::test]
    async fn test_transaction_updates_balance() {
        let store = ReadModelStore::new();
        store.apply_account_created(&account_created()).await.unwrap();
        store
            .apply_transaction_created(&debit(1, dec!(30.00), dec!(70.00)))
            .await
            .unwrap();

        let view = store.account(AccountId::new(1)).unwrap();
        assert_eq!(view.balance, dec!(70.00));
        assert_eq!(view.last_transaction_id, Some(TransactionId::new(1)));
        assert_eq!(store.transactions_for(AccountId::new(1)).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_account_is_retryable_error() {
        let store = ReadModelStore::new();
        let result = store
            .apply_transaction_created(&debit(1, dec!(30.00), dec!(70.00)))
            .await;
        assert_eq!(
            result,
            Err(ProjectionError::AccountNotProjected(AccountId::new(1)))
        );
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_account_redelivery_keeps_projected_balance() {
        let store = ReadModelStore::new();
        store.apply_account_created(&account_created()).await.unwrap();
        store
            .apply_transaction_created(&debit(1, dec!(30.00), dec!(70.00)))
            .await
            .unwrap();
        store.apply_account_created(&account_created()).await.unwrap();

        assert_eq!(store.account(AccountId::new(1)).unwrap().balance, dec!(70.00));
        assert_eq!(store.account_by_number("1000").unwrap().holder_name, "Alice");
    }
}
