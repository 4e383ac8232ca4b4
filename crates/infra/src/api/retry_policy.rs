//! Network-level retry policy
//!
//! Only transport failures (connection errors, resets, timeouts) are retried.
//! Any HTTP response, including 4xx and 5xx, is an answer from the backend
//! and is handed to the caller untouched. Token refresh is a separate
//! concern handled by the refresh coordinator.

use std::time::Duration;

use warden_common::resilience::{
    ExponentialBackoff, Jitter, RetryConfig, RetryDecision, RetryPolicy,
};
use warden_domain::{RetrySettings, WardenError};

/// Exponential backoff over transient transport errors.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRetryPolicy {
    max_attempts: u32,
    backoff: ExponentialBackoff,
}

impl NetworkRetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: ExponentialBackoff::new(base_delay, 2.0, max_delay),
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(settings.max_attempts, settings.base_delay(), settings.max_delay())
    }

    /// A policy that makes a single attempt.
    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a request that has already been tried `attempt` times should
    /// be tried again after failing with `error`.
    pub fn should_retry(&self, error: &WardenError, attempt: u32, max_attempts: u32) -> bool {
        error.is_transient() && attempt < max_attempts
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Executor configuration matching this policy. Delays are supplied by
    /// the policy itself, so no jitter or overall deadline is layered on.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            backoff: self.backoff.clone(),
            jitter: Jitter::None,
            max_total_time: None,
        }
    }
}

impl Default for NetworkRetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy<WardenError> for NetworkRetryPolicy {
    fn should_retry(&self, error: &WardenError, attempt: u32) -> RetryDecision {
        if NetworkRetryPolicy::should_retry(self, error, attempt + 1, self.max_attempts) {
            RetryDecision::RetryAfter(self.backoff_delay(attempt))
        } else {
            RetryDecision::Stop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> NetworkRetryPolicy {
        NetworkRetryPolicy::new(3, Duration::from_millis(1000), Duration::from_secs(10))
    }

    #[test]
    fn backoff_doubles_from_base_and_caps() {
        let policy = policy();
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(8000));
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(10));
        assert_eq!(policy.backoff_delay(30), Duration::from_secs(10));
    }

    #[test]
    fn only_transport_errors_are_retried() {
        let policy = policy();
        assert!(policy.should_retry(&WardenError::Network("reset".into()), 1, 3));
        assert!(policy.should_retry(&WardenError::Timeout("30s".into()), 2, 3));
        assert!(!policy.should_retry(&WardenError::Network("reset".into()), 3, 3));
        assert!(!policy.should_retry(&WardenError::InvalidInput("bad url".into()), 1, 3));
        assert!(!policy.should_retry(&WardenError::Serialization("eof".into()), 1, 3));
    }

    #[test]
    fn executor_decisions_follow_policy() {
        let policy = policy();
        let network = WardenError::Network("reset".into());

        assert_eq!(
            RetryPolicy::should_retry(&policy, &network, 0),
            RetryDecision::RetryAfter(Duration::from_millis(1000))
        );
        assert_eq!(
            RetryPolicy::should_retry(&policy, &network, 1),
            RetryDecision::RetryAfter(Duration::from_millis(2000))
        );
        assert_eq!(RetryPolicy::should_retry(&policy, &network, 2), RetryDecision::Stop);
        assert_eq!(
            RetryPolicy::should_retry(&policy, &WardenError::Auth("401".into()), 0),
            RetryDecision::Stop
        );
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let policy = NetworkRetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(NetworkRetryPolicy::disabled().max_attempts(), 1);
        assert!(policy.retry_config().validate().is_ok());
    }
}
