//! Accounts and transfers.
//!
//! This module implements the write side of the ledger:
//! - Account aggregate and transaction records
//! - Error taxonomy for the transfer pipeline
//! - Persistence ports and the transaction boundary contract
//! - Account number generation
//! - The transfer orchestrator

pub mod account;
pub mod error;
pub mod number;
pub mod service;
pub mod store;
pub mod transaction;

#[cfg(test)]
mod account_props;

pub use account::{Account, AccountView, NewAccount};
pub use error::LedgerError;
pub use number::{AccountNumberGenerator, TimestampAccountNumbers};
pub use service::{TRANSFER_COMPLETED, TransferOrchestrator};
pub use store::{LedgerTx, TransactionBoundary};
pub use transaction::{EntryType, NewTransaction, Transaction, TransactionType};
