//! Shared types and configuration for the bank ledger.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - The uniform response envelope returned by write operations
//! - Configuration management

pub mod config;
pub mod types;

pub use config::AppConfig;
pub use types::{AccountId, ApiResponse, ResponseStatus, TransactionId};
