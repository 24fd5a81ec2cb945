//! Keyed mutual exclusion with canonical ordering and bounded waits.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bank_shared::config::LockConfig;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use super::handle::LockHandle;
use crate::ledger::LedgerError;

/// Sorts and de-duplicates lock keys into the global acquisition order.
#[must_use]
pub fn canonical_order(keys: &[&str]) -> Vec<String> {
    let mut ordered: Vec<String> = keys.iter().map(|key| (*key).to_string()).collect();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}

/// Advisory locks over account numbers.
///
/// One fair async mutex per key, created on first use and pruned once
/// nobody holds or waits for it. Callers with disjoint key sets never
/// contend; callers sharing a key are served in arrival order.
#[derive(Debug)]
pub struct DistributedLockService {
    locks: DashMap<String, Arc<Mutex<()>>>,
    wait_timeout: Duration,
}

impl DistributedLockService {
    /// Creates a lock service whose callers wait at most `wait_timeout`
    /// for their whole key set.
    #[must_use]
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            wait_timeout,
        }
    }

    /// Creates a lock service from configuration.
    #[must_use]
    pub fn from_config(config: &LockConfig) -> Self {
        Self::new(Duration::from_millis(config.wait_timeout_ms))
    }

    /// The configured wait timeout.
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Number of keys currently held or waited on.
    #[must_use]
    pub fn registered_keys(&self) -> usize {
        self.locks.len()
    }

    /// Runs `work` while holding the lock on `key`.
    ///
    /// # Errors
    ///
    /// `LockTimeout` if the key is not acquired in time; `work` is not run.
    /// Otherwise whatever `work` returns.
    pub async fn execute_with_lock<F, Fut, T, E>(&self, key: &str, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LedgerError>,
    {
        self.execute_with_locks(&[key], work).await
    }

    /// Runs `work` while holding the locks on both keys.
    ///
    /// The keys are acquired in canonical order regardless of argument
    /// order. Equal keys are locked once.
    ///
    /// # Errors
    ///
    /// `LockTimeout` if either key is not acquired in time; `work` is not
    /// run. Otherwise whatever `work` returns.
    pub async fn execute_with_transaction_lock<F, Fut, T, E>(
        &self,
        key_a: &str,
        key_b: &str,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LedgerError>,
    {
        self.execute_with_locks(&[key_a, key_b], work).await
    }

    /// Runs `work` while holding the locks on every key.
    ///
    /// # Errors
    ///
    /// `LockTimeout` if any key is not acquired in time; `work` is not run.
    /// Otherwise whatever `work` returns.
    pub async fn execute_with_locks<F, Fut, T, E>(&self, keys: &[&str], work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LedgerError>,
    {
        let handle = self.acquire(keys).await?;
        let result = work().await;
        drop(handle);
        result
    }

    /// Acquires every key in canonical order under one deadline.
    ///
    /// # Errors
    ///
    /// `LockTimeout` naming the first key that could not be acquired. Keys
    /// acquired before it are released before returning.
    pub async fn acquire(&self, keys: &[&str]) -> Result<LockHandle<'_>, LedgerError> {
        let ordered = canonical_order(keys);
        let deadline = Instant::now() + self.wait_timeout;
        let mut handle = LockHandle::new(self, ordered.len());

        for key in ordered {
            let mutex = Arc::clone(&self.locks.entry(key.clone()).or_default());
            if let Ok(guard) = timeout_at(deadline, mutex.lock_owned()).await {
                debug!(key = %key, "Lock acquired");
                handle.push(key, guard);
            } else {
                self.prune(&key);
                warn!(
                    key = %key,
                    held = ?handle.keys(),
                    timeout_ms = self.timeout_ms(),
                    "Lock wait timed out"
                );
                return Err(LedgerError::LockTimeout {
                    key,
                    timeout_ms: self.timeout_ms(),
                });
            }
        }

        Ok(handle)
    }

    /// Drops the registry entry for `key` if only the registry refers to it.
    pub(super) fn prune(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.wait_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}
