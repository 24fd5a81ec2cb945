//! Property-based tests for the account aggregate.
//!
//! - Property 1: Balance conservation across a debit and credit pair
//! - Property 2: Balances never go negative

use bank_shared::types::AccountId;
use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::account::Account;
use super::error::LedgerError;
use super::transaction::NewTransaction;

/// Strategy to generate non-negative balances (0.00 to 100,000.00).
fn balance() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate positive amounts (0.01 to 100,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn account(id: i64, balance: Decimal) -> Account {
    Account {
        id: AccountId::new(id),
        account_number: format!("17000000000{id:02}"),
        holder_name: "Holder".to_string(),
        balance,
        created_at: Utc::now(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property 1: A covered debit followed by the matching credit keeps the
    /// combined balance, and each leg records its own post-mutation balance.
    #[test]
    fn prop_transfer_conserves_total(
        from_balance in balance(),
        to_balance in balance(),
        amount in positive_amount(),
    ) {
        let mut source = account(1, from_balance);
        let mut target = account(2, to_balance);
        let before = source.balance + target.balance;

        match source.withdraw(amount) {
            Ok(()) => {
                target.deposit(amount);
                prop_assert_eq!(source.balance + target.balance, before);
                prop_assert_eq!(NewTransaction::transfer_from(&source, amount).balance_after, from_balance - amount);
                prop_assert_eq!(NewTransaction::transfer_to(&target, amount).balance_after, to_balance + amount);
            }
            Err(err) => {
                let is_insufficient = matches!(err, LedgerError::InsufficientBalance { .. });
                prop_assert!(is_insufficient);
                prop_assert!(amount > from_balance);
                prop_assert_eq!(source.balance, from_balance);
            }
        }
    }

    /// Property 2: No sequence of withdrawals drives a balance below zero.
    #[test]
    fn prop_withdrawals_never_go_negative(
        start in balance(),
        amounts in prop::collection::vec(positive_amount(), 1..20),
    ) {
        let mut acct = account(1, start);
        for amount in amounts {
            let before = acct.balance;
            if acct.withdraw(amount).is_err() {
                prop_assert_eq!(acct.balance, before);
            }
            prop_assert!(acct.balance >= Decimal::ZERO);
        }
    }
}
