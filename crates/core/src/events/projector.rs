use async_trait::async_trait;

use super::error::ProjectionError;
use super::types::{AccountCreatedEvent, TransactionCreatedEvent};

/// Port to the denormalized read model.
///
/// Implementations must be idempotent per event natural key: applying the
/// same event twice leaves the same state as applying it once.
#[async_trait]
pub trait ReadModelProjector: Send + Sync {
    /// Projects a newly opened account.
    async fn apply_account_created(&self, event: &AccountCreatedEvent) -> Result<(), ProjectionError>;

    /// Projects one transaction record and the balance it left behind.
    async fn apply_transaction_created(
        &self,
        event: &TransactionCreatedEvent,
    ) -> Result<(), ProjectionError>;
}
