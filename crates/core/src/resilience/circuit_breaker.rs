//! Circuit breaker for the transfer pipeline.
//!
//! A count-based sliding window of the most recent recorded outcomes decides
//! when the breaker opens.
//!
//! # States
//!
//! - **Closed**: calls pass through. Outcomes enter the window, and once it
//!   holds the minimum number of calls a failure rate at or above the
//!   threshold opens the breaker.
//! - **Open**: calls are rejected without running until the cool-down has
//!   elapsed.
//! - **HalfOpen**: a fixed number of trial calls is admitted and every other
//!   call is rejected. When all trial outcomes are in, their failure rate
//!   decides between Closed and Open.
//!
//! Outcomes classified as ignored (see [`CircuitBreaker::call_with`]) count
//! neither as success nor as failure.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bank_shared::config::BreakerConfig;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of most recent recorded outcomes kept in the window.
    pub sliding_window_size: usize,
    /// Recorded outcomes required before the failure rate is evaluated.
    pub minimum_number_of_calls: usize,
    /// Failure rate, in integer percent, at which the breaker opens.
    pub failure_rate_threshold: u8,
    /// How long the breaker stays open before admitting trial calls.
    pub wait_duration_in_open_state: Duration,
    /// Trial calls admitted while half-open.
    pub permitted_calls_in_half_open_state: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 5,
            minimum_number_of_calls: 3,
            failure_rate_threshold: 50,
            wait_duration_in_open_state: Duration::from_secs(30),
            permitted_calls_in_half_open_state: 3,
        }
    }
}

impl From<&BreakerConfig> for CircuitBreakerConfig {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            sliding_window_size: config.sliding_window_size,
            minimum_number_of_calls: config.minimum_number_of_calls,
            failure_rate_threshold: config.failure_rate_threshold,
            wait_duration_in_open_state: Duration::from_secs(
                config.wait_duration_in_open_state_secs,
            ),
            permitted_calls_in_half_open_state: config.permitted_calls_in_half_open_state,
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Calls pass through normally.
    Closed,
    /// Calls are rejected immediately.
    Open,
    /// A bounded number of trial calls probe recovery.
    HalfOpen,
}

/// Errors from circuit breaker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitBreakerError<E> {
    /// The call was rejected without running.
    #[error("Circuit breaker is open")]
    Open,
    /// The operation ran and failed.
    #[error("Operation failed: {0}")]
    Inner(E),
}

/// Counters since the breaker was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerMetrics {
    /// Calls attempted, including rejected ones.
    pub calls: u64,
    /// Calls that succeeded.
    pub successes: u64,
    /// Calls that failed and were recorded as failures.
    pub failures: u64,
    /// Calls rejected while open or while the half-open trials were taken.
    pub rejections: u64,
    /// Calls whose outcome was ignored, including cancelled ones.
    pub ignored: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Ignored,
}

#[derive(Debug)]
struct Inner {
    state: State,
    // Bumped on every transition so outcomes of calls admitted under an
    // earlier state are not applied to the current one.
    generation: u64,
    // true = failure
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trials_admitted: usize,
    trials_recorded: usize,
    trial_failures: usize,
}

/// Count-based sliding-window circuit breaker.
///
/// The state lives behind a short synchronous mutex that is never held
/// across an await, so one breaker can be shared by every request task.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
    ignored: AtomicU64,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// A zero window size or trial count is treated as one.
    #[must_use]
    pub fn new(mut config: CircuitBreakerConfig) -> Self {
        config.sliding_window_size = config.sliding_window_size.max(1);
        config.permitted_calls_in_half_open_state = config.permitted_calls_in_half_open_state.max(1);
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                generation: 0,
                window: VecDeque::new(),
                opened_at: None,
                trials_admitted: 0,
                trials_recorded: 0,
                trial_failures: 0,
            }),
            calls: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    /// Creates a closed breaker from configuration.
    #[must_use]
    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::new(CircuitBreakerConfig::from(config))
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. An open breaker whose cool-down has elapsed reports
    /// `HalfOpen`.
    pub fn state(&self) -> State {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Runs `operation` through the breaker, recording every error as a
    /// failure.
    ///
    /// # Errors
    ///
    /// `CircuitBreakerError::Open` if the call was rejected, otherwise
    /// `CircuitBreakerError::Inner` with the operation's error.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(operation, |_| true).await
    }

    /// Runs `operation` through the breaker.
    ///
    /// `records_failure` decides whether an error counts as a failure. When
    /// it returns `false` the outcome is ignored: it does not enter the
    /// window, and a half-open trial slot it held is handed back.
    ///
    /// # Errors
    ///
    /// `CircuitBreakerError::Open` if the call was rejected, otherwise
    /// `CircuitBreakerError::Inner` with the operation's error.
    pub async fn call_with<F, Fut, T, E, C>(
        &self,
        operation: F,
        records_failure: C,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let Some(permit) = self.try_acquire() else {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            warn!("Circuit breaker is OPEN, rejecting request");
            return Err(CircuitBreakerError::Open);
        };

        match operation().await {
            Ok(value) => {
                permit.settle(Outcome::Success);
                Ok(value)
            }
            Err(err) => {
                let outcome = if records_failure(&err) {
                    Outcome::Failure
                } else {
                    Outcome::Ignored
                };
                permit.settle(outcome);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Runs `operation` through the breaker and maps every error, including
    /// a rejection, through `fallback`. Never fails.
    pub async fn execute<F, Fut, T, E, C, B>(&self, operation: F, records_failure: C, fallback: B) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
        B: FnOnce(CircuitBreakerError<E>) -> T,
    {
        match self.call_with(operation, records_failure).await {
            Ok(value) => value,
            Err(err) => fallback(err),
        }
    }

    /// Counters since creation.
    #[must_use]
    pub fn metrics(&self) -> BreakerMetrics {
        BreakerMetrics {
            calls: self.calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }

    /// Forces the breaker closed with an empty window.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        info!("Circuit breaker manually reset to CLOSED");
        self.transition(&mut inner, State::Closed);
    }

    fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        match inner.state {
            State::Closed => {}
            State::Open => return None,
            State::HalfOpen => {
                if inner.trials_admitted >= self.config.permitted_calls_in_half_open_state {
                    return None;
                }
                inner.trials_admitted += 1;
            }
        }
        Some(Permit {
            breaker: self,
            generation: inner.generation,
            settled: false,
        })
    }

    fn refresh(&self, inner: &mut Inner) {
        let cooled_down = inner
            .opened_at
            .is_some_and(|at| at.elapsed() >= self.config.wait_duration_in_open_state);
        if inner.state == State::Open && cooled_down {
            self.transition(inner, State::HalfOpen);
        }
    }

    fn record(&self, generation: u64, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Success => &self.successes,
            Outcome::Failure => &self.failures,
            Outcome::Ignored => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }

        match inner.state {
            State::Closed => {
                let failed = match outcome {
                    Outcome::Success => false,
                    Outcome::Failure => true,
                    Outcome::Ignored => return,
                };
                inner.window.push_back(failed);
                while inner.window.len() > self.config.sliding_window_size {
                    inner.window.pop_front();
                }

                let recorded = inner.window.len();
                let failures = inner.window.iter().filter(|failed| **failed).count();
                let minimum = self
                    .config
                    .minimum_number_of_calls
                    .min(self.config.sliding_window_size);
                if recorded >= minimum && self.exceeds_threshold(failures, recorded) {
                    warn!(
                        failures,
                        recorded,
                        threshold = self.config.failure_rate_threshold,
                        "Failure rate threshold reached"
                    );
                    self.transition(&mut inner, State::Open);
                }
            }
            State::HalfOpen => {
                match outcome {
                    Outcome::Ignored => {
                        inner.trials_admitted = inner.trials_admitted.saturating_sub(1);
                        return;
                    }
                    Outcome::Failure => inner.trial_failures += 1,
                    Outcome::Success => {}
                }
                inner.trials_recorded += 1;

                if inner.trials_recorded >= self.config.permitted_calls_in_half_open_state {
                    let next = if self.exceeds_threshold(inner.trial_failures, inner.trials_recorded) {
                        State::Open
                    } else {
                        State::Closed
                    };
                    self.transition(&mut inner, next);
                }
            }
            State::Open => {}
        }
    }

    fn exceeds_threshold(&self, failures: usize, recorded: usize) -> bool {
        failures * 100 >= usize::from(self.config.failure_rate_threshold) * recorded
    }

    fn transition(&self, inner: &mut Inner, to: State) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.window.clear();
        inner.trials_admitted = 0;
        inner.trials_recorded = 0;
        inner.trial_failures = 0;
        inner.opened_at = (to == State::Open).then(Instant::now);

        if to == State::Open {
            warn!(from = ?from, "Circuit breaker transitioning to OPEN");
        } else {
            info!(from = ?from, to = ?to, "Circuit breaker state changed");
        }
    }
}

/// Admission of one call. Dropping it unsettled (the call's future was
/// cancelled) records an ignored outcome.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.record(self.generation, outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record(self.generation, Outcome::Ignored);
        }
    }
}
