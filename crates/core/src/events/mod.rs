//! Domain events and the read-model pipeline.
//!
//! The write path publishes through [`EventPublisher`]. The in-process
//! implementation routes every event kind over its own bounded channel to a
//! fixed consumer, the [`EventReader`], which applies it to a
//! [`ReadModelProjector`] with retry and dead-letters what it cannot apply.

mod dead_letter;
mod error;
mod projector;
mod publisher;
mod reader;
mod types;

pub use dead_letter::{DeadLetterQueue, FailedEvent};
pub use error::{ProjectionError, PublishError};
pub use projector::ReadModelProjector;
pub use publisher::{ChannelEventPublisher, Delivery, EventPublisher, EventReceivers};
pub use reader::{EventReader, EventReaderHandle};
pub use types::{AccountCreatedEvent, DomainEvent, TransactionCreatedEvent};
