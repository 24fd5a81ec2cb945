//! Scoped lock ownership.

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::service::DistributedLockService;

/// Keys held by one caller, in acquisition order.
///
/// Dropping the handle releases every key in reverse acquisition order.
/// This runs on every exit path: normal return, error, panic unwinding and
/// future cancellation.
pub struct LockHandle<'a> {
    service: &'a DistributedLockService,
    held: Vec<(String, OwnedMutexGuard<()>)>,
}

impl<'a> LockHandle<'a> {
    pub(super) fn new(service: &'a DistributedLockService, capacity: usize) -> Self {
        Self {
            service,
            held: Vec::with_capacity(capacity),
        }
    }

    pub(super) fn push(&mut self, key: String, guard: OwnedMutexGuard<()>) {
        self.held.push((key, guard));
    }

    /// Keys held, in the order they were acquired.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.held.iter().map(|(key, _)| key.as_str()).collect()
    }
}

impl Drop for LockHandle<'_> {
    fn drop(&mut self) {
        while let Some((key, guard)) = self.held.pop() {
            drop(guard);
            self.service.prune(&key);
            debug!(key = %key, "Lock released");
        }
    }
}

impl std::fmt::Debug for LockHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("keys", &self.keys())
            .finish()
    }
}
