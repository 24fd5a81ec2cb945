//! Event publishing over typed in-process channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bank_shared::config::EventConfig;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tracing::{debug, warn};

use super::dead_letter::DeadLetterQueue;
use super::error::{ProjectionError, PublishError};
use super::types::{AccountCreatedEvent, DomainEvent, TransactionCreatedEvent};

/// Publishing side of the read-model pipeline.
///
/// The synchronous variants return once the consumer has applied (or given
/// up on) the event. The asynchronous variants return as soon as the event
/// is accepted for delivery.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Delivers `event` and waits for the consumer's result.
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;

    /// Delivers `events` in order, waiting for each one.
    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<(), PublishError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// Hands `event` off for delivery without waiting for the consumer.
    fn publish_async(&self, event: DomainEvent) -> Result<(), PublishError>;

    /// Hands `events` off in order without waiting for the consumer.
    ///
    /// A failed hand-off does not stop the rest; the first error is
    /// returned once every event has been tried.
    fn publish_all_async(&self, events: Vec<DomainEvent>) -> Result<(), PublishError> {
        let mut first_error = None;
        for event in events {
            if let Err(err) = self.publish_async(event) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// One event on its way to the consumer, with an optional acknowledgement
/// channel for synchronous publishers.
#[derive(Debug)]
pub struct Delivery<E> {
    pub(super) event: E,
    pub(super) ack: Option<oneshot::Sender<Result<(), ProjectionError>>>,
}

impl<E> Delivery<E> {
    fn fire_and_forget(event: E) -> Self {
        Self { event, ack: None }
    }

    /// The event being delivered.
    pub fn event(&self) -> &E {
        &self.event
    }
}

/// Receiving ends of the publisher's channels, one per event kind.
#[derive(Debug)]
pub struct EventReceivers {
    /// `AccountCreated` deliveries.
    pub accounts: mpsc::Receiver<Delivery<AccountCreatedEvent>>,
    /// `TransactionCreated` deliveries.
    pub transactions: mpsc::Receiver<Delivery<TransactionCreatedEvent>>,
}

/// [`EventPublisher`] backed by one bounded channel per event kind.
///
/// Asynchronous publishes first try an immediate send. If the channel is
/// full the send moves to a spawned task, and at most
/// `dispatch_concurrency` such tasks exist at once; beyond that the publish
/// fails with [`PublishError::Saturated`]. An event that cannot be handed
/// off goes to the dead-letter queue set with
/// [`ChannelEventPublisher::with_dead_letters`].
#[derive(Debug)]
pub struct ChannelEventPublisher {
    accounts: mpsc::Sender<Delivery<AccountCreatedEvent>>,
    transactions: mpsc::Sender<Delivery<TransactionCreatedEvent>>,
    dispatch: Arc<Semaphore>,
    dead_letters: Option<Arc<DeadLetterQueue>>,
    published: AtomicU64,
}

impl ChannelEventPublisher {
    /// Creates a publisher and the receivers its reader consumes.
    #[must_use]
    pub fn channel(config: &EventConfig) -> (Self, EventReceivers) {
        Self::with_capacity(config.channel_capacity, config.dispatch_concurrency)
    }

    /// Creates a publisher with explicit channel capacity and hand-off limit.
    #[must_use]
    pub fn with_capacity(capacity: usize, dispatch_concurrency: usize) -> (Self, EventReceivers) {
        let (accounts, account_rx) = mpsc::channel(capacity.max(1));
        let (transactions, transaction_rx) = mpsc::channel(capacity.max(1));
        let publisher = Self {
            accounts,
            transactions,
            dispatch: Arc::new(Semaphore::new(dispatch_concurrency)),
            dead_letters: None,
            published: AtomicU64::new(0),
        };
        let receivers = EventReceivers {
            accounts: account_rx,
            transactions: transaction_rx,
        };
        (publisher, receivers)
    }

    /// Sends events whose asynchronous hand-off fails to `dead_letters`,
    /// from where the reader can replay them.
    #[must_use]
    pub fn with_dead_letters(mut self, dead_letters: Arc<DeadLetterQueue>) -> Self {
        self.dead_letters = Some(dead_letters);
        self
    }

    /// Events accepted since creation.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    async fn deliver_and_wait<E>(
        sender: &mpsc::Sender<Delivery<E>>,
        event: E,
        kind: &'static str,
    ) -> Result<(), PublishError> {
        let (ack, outcome) = oneshot::channel();
        sender
            .send(Delivery {
                event,
                ack: Some(ack),
            })
            .await
            .map_err(|_| PublishError::ChannelClosed(kind))?;

        match outcome.await {
            Ok(result) => result.map_err(PublishError::from),
            Err(_) => Err(PublishError::ChannelClosed(kind)),
        }
    }

    fn hand_off<E>(
        &self,
        sender: &mpsc::Sender<Delivery<E>>,
        event: E,
        kind: &'static str,
    ) -> Result<(), PublishError>
    where
        E: Into<DomainEvent> + Send + 'static,
    {
        match sender.try_send(Delivery::fire_and_forget(event)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(delivery)) => {
                let err = PublishError::ChannelClosed(kind);
                self.dead_letter(delivery.event.into(), &err);
                Err(err)
            }
            Err(TrySendError::Full(delivery)) => {
                let Ok(permit) = Arc::clone(&self.dispatch).try_acquire_owned() else {
                    warn!(kind, "Event channel full and dispatch pool exhausted");
                    let err = PublishError::Saturated(kind);
                    self.dead_letter(delivery.event.into(), &err);
                    return Err(err);
                };
                debug!(kind, "Event channel full, dispatching hand-off task");
                let sender = sender.clone();
                let dead_letters = self.dead_letters.clone();
                tokio::spawn(async move {
                    if let Err(mpsc::error::SendError(delivery)) = sender.send(delivery).await {
                        warn!(kind, "Event channel closed before hand-off completed");
                        if let Some(dead_letters) = dead_letters {
                            dead_letters.push(
                                delivery.event.into(),
                                &PublishError::ChannelClosed(kind),
                                1,
                            );
                        }
                    }
                    drop(permit);
                });
                Ok(())
            }
        }
    }

    fn dead_letter(&self, event: DomainEvent, err: &PublishError) {
        match &self.dead_letters {
            Some(dead_letters) => dead_letters.push(event, err, 1),
            None => warn!(key = %event.natural_key(), error = %err, "Undeliverable event dropped"),
        }
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        let kind = event.kind();
        let result = match event {
            DomainEvent::AccountCreated(event) => {
                Self::deliver_and_wait(&self.accounts, event, kind).await
            }
            DomainEvent::TransactionCreated(event) => {
                Self::deliver_and_wait(&self.transactions, event, kind).await
            }
        };
        if result.is_ok() {
            self.published.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn publish_async(&self, event: DomainEvent) -> Result<(), PublishError> {
        let kind = event.kind();
        match event {
            DomainEvent::AccountCreated(event) => self.hand_off(&self.accounts, event, kind)?,
            DomainEvent::TransactionCreated(event) => {
                self.hand_off(&self.transactions, event, kind)?;
            }
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        debug!(kind, "Event accepted for delivery");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bank_shared::types::AccountId;
    use rust_decimal_macros::dec;

    fn account_event(id: i64) -> DomainEvent {
        DomainEvent::AccountCreated(AccountCreatedEvent {
            account_id: AccountId::new(id),
            account_number: format!("17000000000{id:02}"),
            holder_name: "Alice".into(),
            initial_balance: dec!(100.00),
        })
    }

    #[tokio::test]
    async fn test_publish_async_returns_before_consumption() {
        let (publisher, mut receivers) = ChannelEventPublisher::with_capacity(4, 1);
        publisher.publish_async(account_event(1)).unwrap();
        assert_eq!(publisher.events_published(), 1);

        let delivery = receivers.accounts.recv().await.unwrap();
        assert_eq!(delivery.event().account_id, AccountId::new(1));
        assert!(delivery.ack.is_none());
    }

    #[tokio::test]
    async fn test_publish_waits_for_acknowledgement() {
        let (publisher, mut receivers) = ChannelEventPublisher::with_capacity(4, 1);
        let consumer = tokio::spawn(async move {
            let delivery = receivers.accounts.recv().await.unwrap();
            delivery
                .ack
                .unwrap()
                .send(Err(ProjectionError::Storage("disk".into())))
                .unwrap();
        });

        let result = publisher.publish(account_event(1)).await;
        assert_eq!(
            result,
            Err(PublishError::Rejected(ProjectionError::Storage("disk".into())))
        );
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_full_channel_dispatches_then_saturates() {
        let (publisher, mut receivers) = ChannelEventPublisher::with_capacity(1, 1);
        publisher.publish_async(account_event(1)).unwrap();
        // Channel full: moves to the single hand-off task.
        publisher.publish_async(account_event(2)).unwrap();
        // Channel full and the hand-off slot is taken.
        assert_eq!(
            publisher.publish_async(account_event(3)),
            Err(PublishError::Saturated("AccountCreated"))
        );

        let first = receivers.accounts.recv().await.unwrap();
        let second = receivers.accounts.recv().await.unwrap();
        assert_eq!(first.event().account_id, AccountId::new(1));
        assert_eq!(second.event().account_id, AccountId::new(2));
    }

    #[tokio::test]
    async fn test_closed_channel_is_reported() {
        let (publisher, receivers) = ChannelEventPublisher::with_capacity(4, 1);
        drop(receivers);
        assert_eq!(
            publisher.publish_async(account_event(1)),
            Err(PublishError::ChannelClosed("AccountCreated"))
        );
        assert_eq!(
            publisher.publish(account_event(1)).await,
            Err(PublishError::ChannelClosed("AccountCreated"))
        );
        assert_eq!(publisher.events_published(), 0);
    }

    #[tokio::test]
    async fn test_saturated_hand_off_is_dead_lettered() {
        let dead_letters = Arc::new(DeadLetterQueue::new());
        let (publisher, _receivers) = ChannelEventPublisher::with_capacity(1, 1);
        let publisher = publisher.with_dead_letters(Arc::clone(&dead_letters));
        publisher.publish_async(account_event(1)).unwrap();
        publisher.publish_async(account_event(2)).unwrap();

        assert_eq!(
            publisher.publish_async(account_event(3)),
            Err(PublishError::Saturated("AccountCreated"))
        );
        let pending = dead_letters.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event, account_event(3));
        assert_eq!(pending[0].error, "Event dispatch for AccountCreated is saturated");
    }

    #[tokio::test]
    async fn test_publish_all_async_tries_every_event() {
        let dead_letters = Arc::new(DeadLetterQueue::new());
        let (publisher, mut receivers) = ChannelEventPublisher::with_capacity(1, 0);
        let publisher = publisher.with_dead_letters(Arc::clone(&dead_letters));

        let result =
            publisher.publish_all_async(vec![account_event(1), account_event(2), account_event(3)]);

        assert_eq!(result, Err(PublishError::Saturated("AccountCreated")));
        let first = receivers.accounts.recv().await.unwrap();
        assert_eq!(first.event().account_id, AccountId::new(1));
        let keys: Vec<_> = dead_letters
            .pending()
            .iter()
            .map(|entry| entry.event.natural_key())
            .collect();
        assert_eq!(keys, ["account:2", "account:3"]);
    }

    #[tokio::test]
    async fn test_closed_channel_is_dead_lettered() {
        let dead_letters = Arc::new(DeadLetterQueue::new());
        let (publisher, receivers) = ChannelEventPublisher::with_capacity(4, 1);
        let publisher = publisher.with_dead_letters(Arc::clone(&dead_letters));
        drop(receivers);

        assert!(publisher.publish_async(account_event(7)).is_err());
        assert_eq!(dead_letters.len(), 1);
        assert_eq!(dead_letters.pending()[0].attempts, 1);
    }
}
