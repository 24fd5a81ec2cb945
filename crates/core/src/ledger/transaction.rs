//! Transaction records (ledger entries).

use bank_shared::types::{AccountId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::Account;

/// Transaction type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Cash paid into an account.
    Deposit,
    /// Cash taken out of an account.
    Withdrawal,
    /// One leg of a transfer between accounts.
    Transfer,
}

/// Direction of a record relative to its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money left the account.
    Debit,
    /// Money entered the account.
    Credit,
}

/// An immutable, appended transaction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Monotonic identifier assigned on append.
    pub id: TransactionId,
    /// Account this record belongs to.
    pub account_id: AccountId,
    /// Record classification.
    pub transaction_type: TransactionType,
    /// Debit or credit.
    pub entry_type: EntryType,
    /// Unsigned amount.
    pub amount: Decimal,
    /// Free-text description.
    pub description: String,
    /// Account balance right after this record was applied.
    pub balance_after: Decimal,
    /// When the record was appended.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Returns the signed amount (negative for debit, positive for credit).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => -self.amount,
            EntryType::Credit => self.amount,
        }
    }
}

/// A record waiting to be appended. The store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Account this record belongs to.
    pub account_id: AccountId,
    /// Record classification.
    pub transaction_type: TransactionType,
    /// Debit or credit.
    pub entry_type: EntryType,
    /// Unsigned amount.
    pub amount: Decimal,
    /// Free-text description.
    pub description: String,
    /// Account balance right after this record was applied.
    pub balance_after: Decimal,
}

impl NewTransaction {
    /// Debit leg of a transfer, taken after `source` was debited.
    #[must_use]
    pub fn transfer_from(source: &Account, amount: Decimal) -> Self {
        Self {
            account_id: source.id,
            transaction_type: TransactionType::Transfer,
            entry_type: EntryType::Debit,
            amount,
            description: "Transfer From".to_string(),
            balance_after: source.balance,
        }
    }

    /// Credit leg of a transfer, taken after `target` was credited.
    #[must_use]
    pub fn transfer_to(target: &Account, amount: Decimal) -> Self {
        Self {
            account_id: target.id,
            transaction_type: TransactionType::Transfer,
            entry_type: EntryType::Credit,
            amount,
            description: "Transfer To".to_string(),
            balance_after: target.balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(id: i64, balance: Decimal) -> Account {
        Account {
            id: AccountId::new(id),
            account_number: format!("{id}"),
            holder_name: "Holder".to_string(),
            balance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transfer_legs_snapshot_balances() {
        let source = account(1, dec!(70.00));
        let target = account(2, dec!(80.00));

        let debit = NewTransaction::transfer_from(&source, dec!(30.00));
        let credit = NewTransaction::transfer_to(&target, dec!(30.00));

        assert_eq!(debit.account_id, AccountId::new(1));
        assert_eq!(debit.entry_type, EntryType::Debit);
        assert_eq!(debit.balance_after, dec!(70.00));
        assert_eq!(credit.account_id, AccountId::new(2));
        assert_eq!(credit.entry_type, EntryType::Credit);
        assert_eq!(credit.balance_after, dec!(80.00));
        assert_eq!(debit.transaction_type, TransactionType::Transfer);
    }

    #[test]
    fn test_signed_amount() {
        let record = Transaction {
            id: TransactionId::new(1),
            account_id: AccountId::new(1),
            transaction_type: TransactionType::Transfer,
            entry_type: EntryType::Debit,
            amount: dec!(30.00),
            description: "Transfer From".into(),
            balance_after: dec!(70.00),
            created_at: Utc::now(),
        };
        assert_eq!(record.signed_amount(), dec!(-30.00));

        let credit = Transaction {
            entry_type: EntryType::Credit,
            ..record
        };
        assert_eq!(credit.signed_amount(), dec!(30.00));
    }
}
