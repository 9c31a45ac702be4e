//! Retry policy for compare-and-set conflicts.

use backon::ExponentialBuilder;
use std::time::Duration;

/// Configuration for retrying a lost compare-and-set with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 16,
            initial_delay_ms: 1,
            max_delay_ms: 100,
        }
    }
}

impl RetryConfig {
    /// Creates a RetryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `NUMSEQ_CAS_MAX_RETRIES`: Maximum retry attempts (default: 16)
    /// - `NUMSEQ_CAS_RETRY_INITIAL_MS`: Initial backoff delay in ms (default: 1)
    /// - `NUMSEQ_CAS_RETRY_MAX_MS`: Maximum backoff delay in ms (default: 100)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_retries: env_or("NUMSEQ_CAS_MAX_RETRIES", default.max_retries),
            initial_delay_ms: env_or("NUMSEQ_CAS_RETRY_INITIAL_MS", default.initial_delay_ms),
            max_delay_ms: env_or("NUMSEQ_CAS_RETRY_MAX_MS", default.max_delay_ms),
        }
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Creates an exponential backoff builder with jitter.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
