//! Domain events published after a successful commit.

use bank_shared::types::{AccountId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{Account, EntryType, Transaction, TransactionType};

/// An account was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreatedEvent {
    /// Internal identifier.
    pub account_id: AccountId,
    /// Account number.
    pub account_number: String,
    /// Name of the account holder.
    pub holder_name: String,
    /// Opening balance.
    pub initial_balance: Decimal,
}

impl From<&Account> for AccountCreatedEvent {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            account_number: account.account_number.clone(),
            holder_name: account.holder_name.clone(),
            initial_balance: account.balance,
        }
    }
}

/// A transaction record was appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCreatedEvent {
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

impl From<&Transaction> for TransactionCreatedEvent {
    fn from(transaction: &Transaction) -> Self {
        Self {
            transaction_id: transaction.id,
            account_id: transaction.account_id,
            transaction_type: transaction.transaction_type,
            entry_type: transaction.entry_type,
            description: transaction.description.clone(),
            amount: transaction.amount,
            balance_after: transaction.balance_after,
        }
    }
}

/// Every event the ledger publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    /// See [`AccountCreatedEvent`].
    AccountCreated(AccountCreatedEvent),
    /// See [`TransactionCreatedEvent`].
    TransactionCreated(TransactionCreatedEvent),
}

impl DomainEvent {
    /// Event kind, used in logs and channel errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccountCreated(_) => "AccountCreated",
            Self::TransactionCreated(_) => "TransactionCreated",
        }
    }

    /// Key that identifies the event for idempotent application.
    #[must_use]
    pub fn natural_key(&self) -> String {
        match self {
            Self::AccountCreated(event) => format!("account:{}", event.account_id),
            Self::TransactionCreated(event) => format!("transaction:{}", event.transaction_id),
        }
    }
}

impl From<AccountCreatedEvent> for DomainEvent {
    fn from(event: AccountCreatedEvent) -> Self {
        Self::AccountCreated(event)
    }
}

impl From<TransactionCreatedEvent> for DomainEvent {
    fn from(event: TransactionCreatedEvent) -> Self {
        Self::TransactionCreated(event)
    }
}
