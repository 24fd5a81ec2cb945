//! Failure containment for the write path and the read-model consumer.
//!
//! - [`CircuitBreaker`] guards the transfer pipeline with a count-based
//!   sliding window.
//! - [`retry_with_backoff`] retries projector calls with a fixed delay.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{
    BreakerMetrics, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, State,
};
pub use retry::{RetryPolicy, retry_with_backoff};
