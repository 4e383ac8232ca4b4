//! Resilience patterns for transient failures
//!
//! Only retry lives here today: a generic executor driven by a
//! [`RetryPolicy`] that decides, per error, whether another attempt is worth
//! making. Callers bring their own error type and classification; the
//! executor owns attempt counting, backoff, jitter and the overall time cap.
//!
//! ```rust
//! # #[cfg(feature = "runtime")]
//! # async fn demo() {
//! use std::time::Duration;
//!
//! use warden_common::resilience::{policies::PredicateRetry, RetryConfig, RetryExecutor};
//!
//! let config = RetryConfig::builder()
//!     .max_attempts(3)
//!     .exponential_backoff(Duration::from_millis(100), 2.0, Duration::from_secs(1))
//!     .no_jitter()
//!     .build()
//!     .unwrap();
//! let executor = RetryExecutor::new(config, PredicateRetry::new(|e: &&str, _: u32| *e == "busy"));
//! let value = executor.execute(|| async { Ok::<_, &str>(7) }).await;
//! assert_eq!(value.unwrap(), 7);
//! # }
//! ```

pub mod retry;

pub use retry::{
    policies, retry_with_policy, ExponentialBackoff, Jitter, RetryConfig, RetryConfigBuilder,
    RetryDecision, RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
