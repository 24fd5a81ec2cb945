//! Account aggregate.

use bank_shared::types::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;

/// A ledger account.
///
/// The balance is never negative in committed state; [`Account::withdraw`]
/// refuses any debit the balance cannot cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Monotonic internal identifier.
    pub id: AccountId,
    /// Externally visible, immutable account number.
    pub account_number: String,
    /// Name of the account holder.
    pub holder_name: String,
    /// Current balance.
    pub balance: Decimal,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Debits the account.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if the balance is lower than `amount`;
    /// the account is left unchanged.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account_number: self.account_number.clone(),
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Credits the account.
    pub fn deposit(&mut self, amount: Decimal) {
        self.balance += amount;
    }

    /// Returns the caller-facing view of this account.
    #[must_use]
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            account_number: self.account_number.clone(),
            holder_name: self.holder_name.clone(),
            balance: self.balance,
            created_at: self.created_at,
        }
    }
}

/// Input for opening an account. The store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Generated account number.
    pub account_number: String,
    /// Name of the account holder.
    pub holder_name: String,
    /// Opening balance (non-negative).
    pub initial_balance: Decimal,
}

/// Account data returned by `CreateAccount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    /// Internal identifier.
    pub id: AccountId,
    /// Account number.
    pub account_number: String,
    /// Holder name.
    pub holder_name: String,
    /// Balance at the time of the response.
    pub balance: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal) -> Account {
        Account {
            id: AccountId::new(1),
            account_number: "1700000000000".to_string(),
            holder_name: "Alice".to_string(),
            balance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_withdraw_reduces_balance() {
        let mut acct = account(dec!(100.00));
        acct.withdraw(dec!(30.00)).unwrap();
        assert_eq!(acct.balance, dec!(70.00));
    }

    #[test]
    fn test_withdraw_entire_balance() {
        let mut acct = account(dec!(50.00));
        acct.withdraw(dec!(50.00)).unwrap();
        assert_eq!(acct.balance, Decimal::ZERO);
    }

    #[test]
    fn test_withdraw_more_than_balance_is_rejected() {
        let mut acct = account(dec!(70.00));
        let err = acct.withdraw(dec!(1000.00)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(acct.balance, dec!(70.00));
    }

    #[test]
    fn test_deposit_and_view() {
        let mut acct = account(dec!(50.00));
        acct.deposit(dec!(30.00));
        let view = acct.view();
        assert_eq!(view.balance, dec!(80.00));
        assert_eq!(view.account_number, acct.account_number);
        assert_eq!(view.id, acct.id);
    }
}
