//! In-memory mock implementations of common traits

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::security::{KeychainError, SecretStore};

type StorageData = Arc<Mutex<HashMap<String, String>>>;

/// In-memory [`SecretStore`] with failure injection.
///
/// Clones share storage, so a test can keep one handle for inspection while
/// the code under test owns another.
#[derive(Debug, Clone)]
pub struct MockKeychainProvider {
    storage: StorageData,
    service_name: String,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MockKeychainProvider {
    /// Create a new mock keychain provider with a service name for namespacing.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            service_name: service_name.into(),
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_reads: Arc::new(AtomicBool::new(false)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Make `set_secret` and `delete_secret` fail with `AccessFailed`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `get_secret` fail with `AccessFailed`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set_secret` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw value under `key`, bypassing failure injection.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.storage.lock().get(key).cloned()
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.storage.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MockKeychainProvider {
    fn default() -> Self {
        Self::new("warden-test")
    }
}

impl SecretStore for MockKeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed(format!("write to {key} rejected")));
        }
        self.storage.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed(format!("read of {key} rejected")));
        }
        self.storage.lock().get(key).cloned().ok_or(KeychainError::NotFound)
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed(format!("delete of {key} rejected")));
        }
        self.storage.lock().remove(key);
        Ok(())
    }
}
