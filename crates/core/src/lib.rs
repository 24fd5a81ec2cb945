//! Transfer pipeline for the bank ledger.
//!
//! This crate contains the write-side logic with ZERO storage dependencies.
//! Persistence is reached only through the ports in [`ledger::store`].
//!
//! # Modules
//!
//! - `ledger` - Accounts, transaction records, errors, ports and the transfer orchestrator
//! - `lock` - Ordered multi-key locking with bounded waits
//! - `resilience` - Circuit breaker and retry
//! - `events` - Domain events, publisher, read-model consumer, dead letters

pub mod events;
pub mod ledger;
pub mod lock;
pub mod resilience;
