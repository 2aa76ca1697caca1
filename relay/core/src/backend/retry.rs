//! Retry policy for upstream calls

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::BackendError;

/// Retry configuration for one provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Initial backoff delay
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f32,

    /// Add jitter to backoff
    pub use_jitter: bool,

    /// Retry on these status codes
    pub retry_status_codes: Vec<u16>,

    /// Retry on connection errors
    pub retry_on_connection_error: bool,

    /// Retry on timeout
    pub retry_on_timeout: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
            use_jitter: true,
            retry_status_codes: vec![429, 500, 502, 503, 504],
            retry_on_connection_error: true,
            retry_on_timeout: true,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Calculate backoff duration for an attempt (0-based retry index)
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff_ms as f64
            * f64::from(self.backoff_multiplier).powi(attempt as i32);
        let capped = base.min(self.max_backoff_ms as f64);

        let duration_ms = if self.use_jitter {
            // Add up to 25% jitter
            let jitter = rand::random::<f64>() * 0.25;
            (capped * (1.0 + jitter)) as u64
        } else {
            capped as u64
        };

        Duration::from_millis(duration_ms)
    }

    /// Check if a status code should trigger a retry
    #[must_use]
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_status_codes.contains(&status)
    }

    /// Check if a failed attempt should be retried
    #[must_use]
    pub fn should_retry(&self, error: &BackendError) -> bool {
        match error {
            BackendError::Connect(_) | BackendError::Stream(_) => self.retry_on_connection_error,
            BackendError::Timeout(_) => self.retry_on_timeout,
            BackendError::Status { status, .. } => self.should_retry_status(*status),
            BackendError::Request(_) => false,
        }
    }

    /// Whether another attempt is allowed after `attempts_made` attempts
    #[must_use]
    pub fn has_attempts_left(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            use_jitter: false,
            ..RetryConfig::default()
        };

        assert_eq!(config.backoff_for_attempt(0), Duration::from_millis(200));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(400));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_millis(800));
        assert_eq!(config.backoff_for_attempt(10), Duration::from_millis(5_000));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let config = RetryConfig::default();
        for _ in 0..50 {
            let backoff = config.backoff_for_attempt(0);
            assert!(backoff >= Duration::from_millis(200));
            assert!(backoff <= Duration::from_millis(250));
        }
    }

    #[test]
    fn test_retryable_errors() {
        let config = RetryConfig::default();

        assert!(config.should_retry(&BackendError::Connect("refused".into())));
        assert!(config.should_retry(&BackendError::Timeout(Duration::from_secs(1))));
        assert!(config.should_retry(&BackendError::Stream("reset".into())));
        assert!(config.should_retry(&BackendError::Status {
            status: 503,
            body: String::new()
        }));
        assert!(!config.should_retry(&BackendError::Status {
            status: 401,
            body: String::new()
        }));
        assert!(!config.should_retry(&BackendError::Request("bad url".into())));
    }

    #[test]
    fn test_attempt_budget() {
        let config = RetryConfig::default();
        assert!(config.has_attempts_left(1));
        assert!(config.has_attempts_left(2));
        assert!(!config.has_attempts_left(3));

        let once = RetryConfig::no_retry();
        assert!(!once.has_attempts_left(1));
    }
}
