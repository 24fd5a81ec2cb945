//! In-memory storage for the bank ledger.
//!
//! This crate provides:
//! - [`MemoryLedgerStore`], the transactional account and transaction store
//!   behind the core persistence ports
//! - [`ReadModelStore`], the eventually consistent projection fed by the
//!   event reader

pub mod memory;
pub mod read_model;

pub use memory::{MemoryLedgerStore, MemoryUnitOfWork};
pub use read_model::{AccountReadView, ReadModelStore, TransactionReadView};
