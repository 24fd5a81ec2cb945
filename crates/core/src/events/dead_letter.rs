//! Events the read-model consumer gave up on, or that never reached it.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

use super::types::DomainEvent;

/// An event whose projection failed on every attempt, or whose hand-off to
/// the consumer failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEvent {
    /// The event as published.
    pub event: DomainEvent,
    /// Error from the final attempt.
    pub error: String,
    /// Attempts made.
    pub attempts: usize,
    /// When delivery was given up.
    pub failed_at: DateTime<Utc>,
}

/// In-memory dead-letter queue.
///
/// Entries stay until an operator drains them, typically to re-publish.
#[derive(Debug, Default)]
pub struct DeadLetterQueue {
    entries: Mutex<Vec<FailedEvent>>,
}

impl DeadLetterQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed event and logs it.
    pub fn push(&self, event: DomainEvent, err: &dyn fmt::Display, attempts: usize) {
        error!(
            kind = event.kind(),
            key = %event.natural_key(),
            attempts,
            error = %err,
            "Event moved to dead-letter queue"
        );
        self.entries.lock().push(FailedEvent {
            event,
            error: err.to_string(),
            attempts,
            failed_at: Utc::now(),
        });
    }

    /// Snapshot of the queued entries, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<FailedEvent> {
        self.entries.lock().clone()
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes and returns every entry, oldest first.
    pub fn drain(&self) -> Vec<FailedEvent> {
        std::mem::take(&mut *self.entries.lock())
    }
}
