//! Modular common utilities shared across Warden crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error types and pure helpers
//! - `runtime`: async infrastructure (time, resilience)
//! - `platform`: platform integrations (keychain-backed secret storage)
//! - `observability`: optional tracing (pulled in by `runtime`)
//! - `test-utils`: in-memory test doubles for downstream crates

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod time;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", all(test, feature = "platform")))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{
    retry_with_policy, ExponentialBackoff, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider, SecretStore};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock};
