//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Distributed lock configuration.
    #[serde(default)]
    pub lock: LockConfig,
    /// Circuit breaker configuration for the write path.
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Event delivery configuration.
    #[serde(default)]
    pub events: EventConfig,
}

/// Distributed lock configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// How long a caller waits for all of its keys before giving up.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

fn default_wait_timeout_ms() -> u64 {
    5000
}

/// Circuit breaker configuration.
///
/// Defaults: the last 5 calls are inspected once at least 3 were recorded;
/// a failure rate of 50% opens the breaker for 30 seconds, after which
/// 3 trial calls decide whether it closes again.
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Number of most recent calls kept in the sliding window.
    #[serde(default = "default_sliding_window_size")]
    pub sliding_window_size: usize,
    /// Minimum recorded calls before the failure rate is evaluated.
    #[serde(default = "default_minimum_number_of_calls")]
    pub minimum_number_of_calls: usize,
    /// Failure rate (integer percent) at which the breaker opens.
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: u8,
    /// Cool-down before an open breaker admits trial calls.
    #[serde(default = "default_wait_duration_in_open_state_secs")]
    pub wait_duration_in_open_state_secs: u64,
    /// Trial calls admitted while half-open.
    #[serde(default = "default_permitted_calls_in_half_open_state")]
    pub permitted_calls_in_half_open_state: usize,
    /// Count domain validation errors (not found, insufficient balance)
    /// as breaker failures.
    #[serde(default)]
    pub record_domain_failures: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: default_sliding_window_size(),
            minimum_number_of_calls: default_minimum_number_of_calls(),
            failure_rate_threshold: default_failure_rate_threshold(),
            wait_duration_in_open_state_secs: default_wait_duration_in_open_state_secs(),
            permitted_calls_in_half_open_state: default_permitted_calls_in_half_open_state(),
            record_domain_failures: false,
        }
    }
}

fn default_sliding_window_size() -> usize {
    5
}

fn default_minimum_number_of_calls() -> usize {
    3
}

fn default_failure_rate_threshold() -> u8 {
    50
}

fn default_wait_duration_in_open_state_secs() -> u64 {
    30
}

fn default_permitted_calls_in_half_open_state() -> usize {
    3
}

/// Event delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    /// Buffered deliveries per event channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Concurrent hand-off tasks when a channel is full.
    #[serde(default = "default_dispatch_concurrency")]
    pub dispatch_concurrency: usize,
    /// Attempts the read-model consumer makes per event.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Fixed delay between consumer attempts.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            dispatch_concurrency: default_dispatch_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_dispatch_concurrency() -> usize {
    64
}

fn default_max_attempts() -> usize {
    3
}

fn default_backoff_ms() -> u64 {
    1000 // 1 second
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Environment variables use the `BANK` prefix and `__` between
    /// sections, e.g. `BANK__LOCK__WAIT_TIMEOUT_MS=2000`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("BANK").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
