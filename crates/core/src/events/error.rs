//! Event delivery and projection errors.

use bank_shared::types::AccountId;
use thiserror::Error;

/// Errors raised while handing an event to its consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The consumer side of the channel is gone.
    #[error("Event channel for {0} is closed")]
    ChannelClosed(&'static str),

    /// The channel is full and every hand-off task is busy.
    #[error("Event dispatch for {0} is saturated")]
    Saturated(&'static str),

    /// The consumer gave up on a synchronously published event.
    #[error("Event delivery rejected: {0}")]
    Rejected(#[from] ProjectionError),
}

/// Errors raised while applying an event to the read model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// The read-model store failed.
    #[error("Read model storage failure: {0}")]
    Storage(String),

    /// A transaction arrived before its account was projected.
    #[error("Account {0} is not projected yet")]
    AccountNotProjected(AccountId),
}
