//! Account number generation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Source of new account numbers.
pub trait AccountNumberGenerator: Send + Sync {
    /// Returns the next account number.
    fn next_number(&self) -> String;
}

/// Epoch-millisecond account numbers.
///
/// When two numbers are requested within the same millisecond the second
/// one is bumped past the first, so one generator never repeats itself.
#[derive(Debug, Default)]
pub struct TimestampAccountNumbers {
    last: AtomicU64,
}

impl TimestampAccountNumbers {
    /// Creates a generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountNumberGenerator for TimestampAccountNumbers {
    fn next_number(&self) -> String {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let mut issued = now;
        // fetch_update retries the closure until the CAS wins.
        self.last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                issued = now.max(last + 1);
                Some(issued)
            })
            .unwrap_or_else(|last| last);
        issued.to_string()
    }
}
