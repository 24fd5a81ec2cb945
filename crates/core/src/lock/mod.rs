//! Ordered multi-key locking.
//!
//! Every caller acquires its keys in one canonical (lexicographic) order, so
//! two transfers over the same pair of accounts cannot wait on each other in
//! a cycle, whichever direction they move money in.

mod handle;
mod service;

pub use handle::LockHandle;
pub use service::{DistributedLockService, canonical_order};
