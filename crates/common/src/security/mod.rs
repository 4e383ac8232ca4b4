//! Secure secret storage
//!
//! [`SecretStore`] is the seam between session persistence and the platform
//! keychain. Production code uses [`KeychainProvider`]; tests swap in
//! `testing::MockKeychainProvider`.

pub mod keychain;

pub use keychain::{KeychainError, KeychainProvider, SecretStore};
