//! Retry executor with exponential backoff and pluggable retry policies
//!
//! The executor does not interpret errors. A [`RetryPolicy`] classifies each
//! failure; the executor counts attempts, sleeps between them and reports
//! how the sequence ended. When every attempt fails, the last error comes
//! back inside [`RetryError::AttemptsExhausted`] so callers can surface it
//! unchanged.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Ways a retried operation can end without a value
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed; `source` is the last failure
    #[error("All retry attempts exhausted after {attempts} tries: {source}")]
    AttemptsExhausted { attempts: u32, source: E },

    /// The policy declined to retry `source`
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable { source: E },

    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The overall time budget ran out before the next attempt
    #[error("Retry timeout exceeded after {elapsed:?}")]
    TimeoutExceeded { elapsed: Duration },
}

impl<E> RetryError<E> {
    /// The operation error carried by this variant, if any.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source } => Some(source),
            Self::InvalidConfiguration { .. } | Self::TimeoutExceeded { .. } => None,
        }
    }
}

pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Classifies a failure after the 0-based `attempt`.
pub trait RetryPolicy<E> {
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry after the configured backoff
    Retry,
    /// Retry after the given delay instead of the configured backoff
    RetryAfter(Duration),
    Stop,
}

/// `initial_delay * base^attempt`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    pub initial_delay: Duration,
    pub base: f64,
    pub max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, base: f64, max_delay: Duration) -> Self {
        Self { initial_delay, base, max_delay }
    }

    /// Delay that follows the failed 0-based `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_millis() as f64 * self.base.powi(exponent);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(10))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    None,
    /// Uniform in `0..=delay`
    Full,
}

impl Jitter {
    pub fn apply(self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Full => {
                let max = delay.as_millis() as u64;
                if max == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rand::thread_rng().gen_range(0..=max))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub backoff: ExponentialBackoff,
    pub jitter: Jitter,
    /// No attempt starts once this much time has passed
    pub max_total_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: ExponentialBackoff::default(),
            jitter: Jitter::None,
            max_total_time: None,
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// # Errors
    /// `RetryError::InvalidConfiguration` for zero attempts, a non-positive
    /// base or an initial delay above the cap.
    pub fn validate(&self) -> Result<(), RetryError<()>> {
        let invalid = |message: &str| {
            Err(RetryError::InvalidConfiguration { message: message.to_string() })
        };

        if self.max_attempts == 0 {
            return invalid("max_attempts must be greater than 0");
        }
        if self.backoff.base <= 0.0 {
            return invalid("exponential base must be greater than 0");
        }
        if self.backoff.initial_delay > self.backoff.max_delay {
            return invalid("initial delay must not exceed max delay");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = ExponentialBackoff::new(initial_delay, base, max_delay);
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    pub fn full_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Full;
        self
    }

    pub fn max_total_time(mut self, duration: Duration) -> Self {
        self.config.max_total_time = Some(duration);
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryError<()>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Run `operation` until it succeeds, the policy stops, attempts run out
    /// or the time budget is spent.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            if let Some(budget) = self.config.max_total_time {
                let elapsed = started.elapsed();
                if elapsed >= budget {
                    warn!(?elapsed, attempts = attempt, "retry time budget exceeded");
                    return Err(RetryError::TimeoutExceeded { elapsed });
                }
            }

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };
            let attempts = attempt + 1;

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(%error, "retry policy declined to retry");
                    return Err(RetryError::NonRetryable { source: error });
                }
                _ if attempts >= self.config.max_attempts => {
                    warn!(attempts, %error, "all retry attempts exhausted");
                    return Err(RetryError::AttemptsExhausted { attempts, source: error });
                }
                RetryDecision::Retry => self.config.jitter.apply(self.config.backoff.delay(attempt)),
                RetryDecision::RetryAfter(delay) => delay,
            };

            warn!(attempt = attempts, ?delay, %error, "operation failed, retrying");
            tokio::time::sleep(delay).await;
            attempt = attempts;
        }
    }
}

/// Build an executor for `config` and `policy` and run `operation` once
/// through it.
pub async fn retry_with_policy<F, Fut, T, E, P>(
    config: RetryConfig,
    policy: P,
    operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: RetryPolicy<E>,
    E: fmt::Display,
{
    RetryExecutor::new(config, policy).execute(operation).await
}

/// Stock policies
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    #[derive(Debug, Clone)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    #[derive(Debug, Clone)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Retries while `predicate(error, attempt)` holds.
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
