//! Test doubles shared by Warden crates
//!
//! Enable the `test-utils` feature from a dev-dependency to use these in
//! downstream tests:
//!
//! ```rust
//! # #[cfg(feature = "test-utils")]
//! # {
//! use warden_common::security::SecretStore;
//! use warden_common::testing::{MockClock, MockKeychainProvider};
//!
//! let keychain = MockKeychainProvider::new("warden-test");
//! keychain.set_secret("session.default", "{}").unwrap();
//! assert_eq!(keychain.keys(), vec!["session.default".to_string()]);
//!
//! let clock = MockClock::new();
//! clock.advance_millis(250);
//! # }
//! ```

pub mod mocks;

pub use mocks::MockKeychainProvider;

pub use crate::time::MockClock;
