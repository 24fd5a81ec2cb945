//! Read-model consumer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::dead_letter::DeadLetterQueue;
use super::error::ProjectionError;
use super::projector::ReadModelProjector;
use super::publisher::{Delivery, EventReceivers};
use super::types::DomainEvent;
use crate::resilience::{RetryPolicy, retry_with_backoff};

/// Applies published events to the read model.
///
/// Each event is tried according to the retry policy. An event that fails
/// every attempt goes to the dead-letter queue; the reader then moves on to
/// the next delivery.
pub struct EventReader {
    projector: Arc<dyn ReadModelProjector>,
    retry: RetryPolicy,
    dead_letters: Arc<DeadLetterQueue>,
    applied: AtomicU64,
}

impl EventReader {
    /// Creates a reader.
    pub fn new(
        projector: Arc<dyn ReadModelProjector>,
        retry: RetryPolicy,
        dead_letters: Arc<DeadLetterQueue>,
    ) -> Self {
        Self {
            projector,
            retry,
            dead_letters,
            applied: AtomicU64::new(0),
        }
    }

    /// The queue failed events are moved to.
    pub fn dead_letters(&self) -> &Arc<DeadLetterQueue> {
        &self.dead_letters
    }

    /// Events applied successfully so far.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Starts one worker per channel.
    ///
    /// Deliveries on one channel are applied in order. The workers stop
    /// once every publisher handle is dropped and the channels are drained.
    pub fn spawn(self: Arc<Self>, receivers: EventReceivers) -> EventReaderHandle {
        let EventReceivers {
            accounts,
            transactions,
        } = receivers;
        EventReaderHandle {
            accounts: tokio::spawn(Arc::clone(&self).consume(accounts, "AccountCreated")),
            transactions: tokio::spawn(self.consume(transactions, "TransactionCreated")),
        }
    }

    /// Applies `event` with retry, dead-lettering it if every attempt fails.
    pub async fn process(&self, event: DomainEvent) -> Result<(), ProjectionError> {
        let target = &event;
        let result = retry_with_backoff(&self.retry, || self.apply(target)).await;
        match &result {
            Ok(()) => {
                self.applied.fetch_add(1, Ordering::Relaxed);
                debug!(key = %event.natural_key(), "Event applied to read model");
            }
            Err(err) => self.dead_letters.push(event, err, self.retry.attempts()),
        }
        result
    }

    /// Drains the dead-letter queue and processes each entry again.
    ///
    /// Entries that fail again are queued anew. Returns how many succeeded.
    pub async fn replay_dead_letters(&self) -> usize {
        let entries = self.dead_letters.drain();
        info!(count = entries.len(), "Replaying dead-lettered events");
        let mut recovered = 0;
        for entry in entries {
            if self.process(entry.event).await.is_ok() {
                recovered += 1;
            }
        }
        recovered
    }

    async fn apply(&self, event: &DomainEvent) -> Result<(), ProjectionError> {
        match event {
            DomainEvent::AccountCreated(event) => self.projector.apply_account_created(event).await,
            DomainEvent::TransactionCreated(event) => {
                self.projector.apply_transaction_created(event).await
            }
        }
    }

    async fn consume<E>(self: Arc<Self>, mut receiver: mpsc::Receiver<Delivery<E>>, kind: &'static str)
    where
        E: Into<DomainEvent> + Send + 'static,
    {
        debug!(kind, "Event reader started");
        while let Some(Delivery { event, ack }) = receiver.recv().await {
            let result = self.process(event.into()).await;
            if let Some(ack) = ack {
                // The publisher may have stopped waiting.
                let _ = ack.send(result);
            }
        }
        debug!(kind, "Event channel closed, reader stopped");
    }
}

impl std::fmt::Debug for EventReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReader")
            .field("retry", &self.retry)
            .field("dead_letters", &self.dead_letters.len())
            .field("applied", &self.applied())
            .finish_non_exhaustive()
    }
}

/// Worker tasks of a running [`EventReader`].
#[derive(Debug)]
pub struct EventReaderHandle {
    accounts: JoinHandle<()>,
    transactions: JoinHandle<()>,
}

impl EventReaderHandle {
    /// Waits for both workers to finish.
    ///
    /// # Errors
    ///
    /// Returns the join error of a worker that panicked.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.accounts.await?;
        self.transactions.await
    }

    /// Stops both workers without draining.
    pub fn abort(&self) {
        self.accounts.abort();
        self.transactions.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{
        AccountCreatedEvent, ChannelEventPublisher, EventPublisher, PublishError,
        TransactionCreatedEvent,
    };
    use async_trait::async_trait;
    use bank_shared::types::AccountId;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Fails the first `failures` calls, then records applied account ids.
    #[derive(Default)]
    struct FlakyProjector {
        failures: usize,
        calls: AtomicUsize,
        applied: Mutex<Vec<AccountId>>,
    }

    impl FlakyProjector {
        fn failing(failures: usize) -> Self {
            Self {
                failures,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ReadModelProjector for FlakyProjector {
        async fn apply_account_created(
            &self,
            event: &AccountCreatedEvent,
        ) -> Result<(), ProjectionError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(ProjectionError::Storage("unavailable".into()));
            }
            self.applied.lock().push(event.account_id);
            Ok(())
        }

        async fn apply_transaction_created(
            &self,
            _event: &TransactionCreatedEvent,
        ) -> Result<(), ProjectionError> {
            Ok(())
        }
    }

    fn account_event(id: i64) -> DomainEvent {
        DomainEvent::AccountCreated(AccountCreatedEvent {
            account_id: AccountId::new(id),
            account_number: format!("{id}"),
            holder_name: "Bob".into(),
            initial_balance: dec!(50.00),
        })
    }

    fn reader(projector: Arc<FlakyProjector>) -> Arc<EventReader> {
        Arc::new(EventReader::new(
            projector,
            RetryPolicy::new(3, Duration::from_secs(1)),
            Arc::new(DeadLetterQueue::new()),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_applied_on_third_attempt() {
        let projector = Arc::new(FlakyProjector::failing(2));
        let reader = reader(Arc::clone(&projector));

        reader.process(account_event(1)).await.unwrap();

        assert_eq!(projector.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*projector.applied.lock(), vec![AccountId::new(1)]);
        assert!(reader.dead_letters().is_empty());
        assert_eq!(reader.applied(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_event_is_dead_lettered() {
        let projector = Arc::new(FlakyProjector::failing(usize::MAX));
        let reader = reader(Arc::clone(&projector));

        let result = reader.process(account_event(1)).await;

        assert_eq!(result, Err(ProjectionError::Storage("unavailable".into())));
        assert_eq!(projector.calls.load(Ordering::SeqCst), 3);
        let pending = reader.dead_letters().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 3);
        assert_eq!(pending[0].event, account_event(1));
        assert_eq!(pending[0].error, "Read model storage failure: unavailable");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_recovers_dead_letters() {
        // 3 failures exhaust the first pass; the replay then succeeds.
        let projector = Arc::new(FlakyProjector::failing(3));
        let reader = reader(Arc::clone(&projector));

        assert!(reader.process(account_event(1)).await.is_err());
        assert_eq!(reader.dead_letters().len(), 1);

        assert_eq!(reader.replay_dead_letters().await, 1);
        assert!(reader.dead_letters().is_empty());
        assert_eq!(*projector.applied.lock(), vec![AccountId::new(1)]);
    }

    #[tokio::test]
    async fn test_spawned_reader_acknowledges_and_stops() {
        let projector = Arc::new(FlakyProjector::default());
        let (publisher, receivers) = ChannelEventPublisher::with_capacity(8, 2);
        let handle = reader(Arc::clone(&projector)).spawn(receivers);

        publisher.publish(account_event(1)).await.unwrap();
        publisher.publish_async(account_event(2)).unwrap();
        drop(publisher);
        handle.join().await.unwrap();

        assert_eq!(
            *projector.applied.lock(),
            vec![AccountId::new(1), AccountId::new(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_publish_reports_rejection() {
        let projector = Arc::new(FlakyProjector::failing(usize::MAX));
        let (publisher, receivers) = ChannelEventPublisher::with_capacity(8, 2);
        let reader = reader(projector);
        let _handle = Arc::clone(&reader).spawn(receivers);

        let result = publisher.publish(account_event(1)).await;
        assert_eq!(
            result,
            Err(PublishError::Rejected(ProjectionError::Storage(
                "unavailable".into()
            )))
        );
        assert_eq!(reader.dead_letters().len(), 1);
    }
}
