//! Platform keychain access for credential storage
//!
//! Wraps the `keyring` crate so secrets land in macOS Keychain, Windows
//! Credential Manager or the Linux Secret Service depending on the target.
//!
//! ## Usage
//!
//! ```no_run
//! use warden_common::security::{KeychainProvider, SecretStore};
//!
//! let keychain = KeychainProvider::new("warden");
//! keychain.set_secret("session.default", "{\"access_token\":\"...\"}")?;
//! let secret = keychain.get_secret("session.default")?;
//! # Ok::<(), warden_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Key/value secret storage.
///
/// Implementations must be safe to share across threads; every call is a
/// short synchronous operation against the backing store.
pub trait SecretStore: Send + Sync {
    /// Persist `value` under `key`, replacing any previous value.
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Read the secret stored under `key`.
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` when nothing is stored under `key`.
    fn get_secret(&self, key: &str) -> Result<String, KeychainError>;

    /// Remove the secret under `key`. Deleting a missing key succeeds.
    fn delete_secret(&self, key: &str) -> Result<(), KeychainError>;

    fn secret_exists(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }
}

/// Keychain-backed [`SecretStore`] scoped to a single service name
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a new keychain provider for a specific service
    ///
    /// # Examples
    /// ```
    /// use warden_common::security::KeychainProvider;
    ///
    /// let keychain = KeychainProvider::new("warden");
    /// assert_eq!(keychain.service_name(), "warden");
    /// ```
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn create_entry(&self, key: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, key).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {}", e))
        })
    }
}

impl SecretStore for KeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {}: {}", key, e))
        })
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => KeychainError::NotFound,
            other => KeychainError::AccessFailed(format!(
                "Failed to retrieve secret for {}: {}",
                key, other
            )),
        })
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {}: {}",
                key, e
            ))),
        }
    }
}

/// Keychain error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,
}

#[cfg(test)]
mod tests {
    //! Unit tests for security::keychain.
    use super::*;
    use crate::testing::MockKeychainProvider;

    /// Validates `KeychainProvider::new` behavior for the keychain provider
    /// creation scenario.
    ///
    /// Assertions:
    /// - Confirms `keychain.service_name()` equals `"test-service"`.
    #[test]
    fn test_keychain_provider_creation() {
        let keychain = KeychainProvider::new("test-service");
        assert_eq!(keychain.service_name(), "test-service");
    }

    /// Validates the default `secret_exists` implementation against the
    /// in-memory store.
    ///
    /// Assertions:
    /// - Ensures `secret_exists` flips with set/delete.
    #[test]
    fn test_secret_exists_default_method() {
        let store: &dyn SecretStore = &MockKeychainProvider::new("warden-test");

        assert!(!store.secret_exists("session.default"));
        store.set_secret("session.default", "{}").unwrap();
        assert!(store.secret_exists("session.default"));
        store.delete_secret("session.default").unwrap();
        assert!(!store.secret_exists("session.default"));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(KeychainError::NotFound.to_string(), "Entry not found");
        assert!(KeychainError::AccessFailed("locked".into()).to_string().contains("locked"));
    }
}
