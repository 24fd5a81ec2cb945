//! Write-path orchestration for account creation and transfers.
//!
//! Every operation runs inside the circuit breaker. Failures of any kind
//! come back as an error envelope; nothing is raised to the caller.

use std::sync::Arc;

use bank_shared::types::ApiResponse;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::account::{AccountView, NewAccount};
use super::error::LedgerError;
use super::number::AccountNumberGenerator;
use super::store::{LedgerTx, TransactionBoundary};
use super::transaction::{NewTransaction, Transaction};
use crate::events::{AccountCreatedEvent, DomainEvent, EventPublisher, TransactionCreatedEvent};
use crate::lock::DistributedLockService;
use crate::resilience::CircuitBreaker;

/// Message of a successful transfer, also returned as its data.
pub const TRANSFER_COMPLETED: &str = "Transfer Completed";

/// Coordinates the lock service, the transaction boundary, the circuit
/// breaker and the event publisher.
pub struct TransferOrchestrator<B> {
    boundary: Arc<B>,
    locks: Arc<DistributedLockService>,
    breaker: Arc<CircuitBreaker>,
    publisher: Arc<dyn EventPublisher>,
    numbers: Arc<dyn AccountNumberGenerator>,
    record_domain_failures: bool,
}

impl<B: TransactionBoundary> TransferOrchestrator<B> {
    /// Creates an orchestrator. Domain validation errors are not counted as
    /// breaker failures unless [`Self::with_domain_failures_recorded`] says
    /// otherwise.
    pub fn new(
        boundary: Arc<B>,
        locks: Arc<DistributedLockService>,
        breaker: Arc<CircuitBreaker>,
        publisher: Arc<dyn EventPublisher>,
        numbers: Arc<dyn AccountNumberGenerator>,
    ) -> Self {
        Self {
            boundary,
            locks,
            breaker,
            publisher,
            numbers,
            record_domain_failures: false,
        }
    }

    /// Sets whether not-found, insufficient-balance and invalid-amount errors
    /// count as breaker failures.
    #[must_use]
    pub fn with_domain_failures_recorded(mut self, record: bool) -> Self {
        self.record_domain_failures = record;
        self
    }

    /// The breaker guarding this orchestrator.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Opens an account with `initial_balance`.
    ///
    /// On success the envelope carries the new account and an
    /// `AccountCreated` event has been handed off for delivery.
    pub async fn create_account(
        &self,
        holder_name: &str,
        initial_balance: Decimal,
    ) -> ApiResponse<AccountView> {
        self.breaker
            .execute(
                || self.open_account(holder_name, initial_balance),
                |err| self.records_failure(err),
                |err| {
                    let err = LedgerError::from(err);
                    warn!(
                        error_code = err.error_code(),
                        error = %err,
                        holder_name,
                        "Create Account Failed"
                    );
                    ApiResponse::error("Create Account Failed")
                },
            )
            .await
    }

    /// Moves `amount` from account `from` to account `to`.
    ///
    /// Both account numbers are locked in canonical order for the whole
    /// unit of work. On success both balances, both transaction records and
    /// both `TransactionCreated` events reflect the transfer; on failure
    /// nothing does.
    pub async fn transfer(&self, from: &str, to: &str, amount: Decimal) -> ApiResponse<String> {
        self.breaker
            .execute(
                || self.locked_transfer(from, to, amount),
                |err| self.records_failure(err),
                |err| {
                    let err = LedgerError::from(err);
                    warn!(
                        error_code = err.error_code(),
                        error = %err,
                        from,
                        to,
                        %amount,
                        "Transfer Failed"
                    );
                    ApiResponse::error("Transfer Failed")
                },
            )
            .await
    }

    fn records_failure(&self, err: &LedgerError) -> bool {
        self.record_domain_failures || !err.is_domain_validation()
    }

    async fn open_account(
        &self,
        holder_name: &str,
        initial_balance: Decimal,
    ) -> Result<ApiResponse<AccountView>, LedgerError> {
        if initial_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(initial_balance));
        }

        let account_number = self.numbers.next_number();
        let boundary = &self.boundary;
        let new_account = NewAccount {
            account_number: account_number.clone(),
            holder_name: holder_name.to_string(),
            initial_balance,
        };

        let (account, total) = self
            .locks
            .execute_with_lock(&account_number, || async move {
                boundary.run(|tx| {
                    let account = tx.insert_account(new_account)?;
                    let total = tx.count_accounts()?;
                    Ok::<_, LedgerError>((account, total))
                })
            })
            .await?;

        info!(
            account_id = %account.id,
            account_number = %account.account_number,
            total_accounts = total,
            "Account created"
        );

        let event = DomainEvent::AccountCreated(AccountCreatedEvent::from(&account));
        if let Err(err) = self.publisher.publish_async(event) {
            warn!(account_id = %account.id, error = %err, "AccountCreated hand-off failed");
        }

        Ok(ApiResponse::success(account.view(), "Account Created"))
    }

    async fn locked_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<ApiResponse<String>, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if from == to {
            return Err(LedgerError::SameAccountTransfer(from.to_string()));
        }

        let boundary = &self.boundary;
        let publisher = &self.publisher;
        self.locks
            .execute_with_transaction_lock(from, to, || async move {
                let [debit, credit] = boundary.run(|tx| apply_transfer(tx, from, to, amount))?;

                info!(
                    from,
                    to,
                    %amount,
                    debit_id = %debit.id,
                    credit_id = %credit.id,
                    "Transfer committed"
                );

                let events = vec![
                    DomainEvent::TransactionCreated(TransactionCreatedEvent::from(&debit)),
                    DomainEvent::TransactionCreated(TransactionCreatedEvent::from(&credit)),
                ];
                if let Err(err) = publisher.publish_all_async(events) {
                    warn!(from, to, error = %err, "TransactionCreated hand-off failed");
                }

                Ok::<_, LedgerError>(ApiResponse::success(
                    TRANSFER_COMPLETED.to_string(),
                    TRANSFER_COMPLETED,
                ))
            })
            .await
    }
}

/// Debits `from`, credits `to` and appends one record per leg, all through
/// the same unit of work. Returns the debit and credit records in that
/// order.
fn apply_transfer(
    tx: &mut dyn LedgerTx,
    from: &str,
    to: &str,
    amount: Decimal,
) -> Result<[Transaction; 2], LedgerError> {
    let mut source = tx
        .find_account_by_number(from)?
        .ok_or_else(|| LedgerError::AccountNotFound(from.to_string()))?;
    let mut target = tx
        .find_account_by_number(to)?
        .ok_or_else(|| LedgerError::AccountNotFound(to.to_string()))?;

    source.withdraw(amount)?;
    target.deposit(amount);
    tx.save_account(&source)?;
    tx.save_account(&target)?;

    let debit = tx.save_transaction(NewTransaction::transfer_from(&source, amount))?;
    let credit = tx.save_transaction(NewTransaction::transfer_to(&target, amount))?;
    Ok([debit, credit])
}

impl<B> std::fmt::Debug for TransferOrchestrator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("locks", &self.locks)
            .field("breaker_state", &self.breaker.state())
            .field("record_domain_failures", &self.record_domain_failures)
            .finish_non_exhaustive()
    }
}
