//! Ledger error types for the transfer pipeline.
//!
//! Domain validation errors are raised inside a unit of work and roll it
//! back; infrastructure errors come from the lock service, the store or the
//! circuit breaker. Both are folded into the same failure envelope by the
//! orchestrator.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::resilience::CircuitBreakerError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Domain Validation Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Source account cannot cover the requested amount.
    #[error("Insufficient balance in account {account_number}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        /// The account being debited.
        account_number: String,
        /// Balance before the debit.
        balance: Decimal,
        /// Requested debit.
        requested: Decimal,
    },

    /// Amount violates the operation's precondition.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Source and target of a transfer are the same account.
    #[error("Cannot transfer from account {0} to itself")]
    SameAccountTransfer(String),

    // ========== Conflict Errors ==========
    /// Generated account number already exists.
    #[error("Account number {0} already exists")]
    AccountNumberConflict(String),

    // ========== Infrastructure Errors ==========
    /// A lock key could not be acquired within the wait timeout.
    #[error("Timed out after {timeout_ms}ms waiting for lock on {key}")]
    LockTimeout {
        /// The key that was still held by another caller.
        key: String,
        /// The configured wait timeout.
        timeout_ms: u64,
    },

    /// The store failed to read or commit.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// The circuit breaker short-circuited the call.
    #[error("Circuit breaker is open")]
    BreakerOpen,
}

impl LedgerError {
    /// Returns the error code used in logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::SameAccountTransfer(_) => "SAME_ACCOUNT_TRANSFER",
            Self::AccountNumberConflict(_) => "ACCOUNT_NUMBER_CONFLICT",
            Self::LockTimeout { .. } => "LOCK_TIMEOUT",
            Self::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            Self::BreakerOpen => "BREAKER_OPEN",
        }
    }

    /// Returns true for errors caused by the request itself rather than by
    /// the lock service, the store or the breaker.
    #[must_use]
    pub fn is_domain_validation(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound(_)
                | Self::InsufficientBalance { .. }
                | Self::InvalidAmount(_)
                | Self::SameAccountTransfer(_)
        )
    }

    /// Returns true for lock, store and breaker failures.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::PersistenceFailure(_) | Self::BreakerOpen
        )
    }
}

impl From<CircuitBreakerError<LedgerError>> for LedgerError {
    fn from(err: CircuitBreakerError<LedgerError>) -> Self {
        match err {
            CircuitBreakerError::Open => Self::BreakerOpen,
            CircuitBreakerError::Inner(inner) => inner,
        }
    }
}
