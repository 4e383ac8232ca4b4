//! Persistent session storage
//!
//! One login is persisted as a single JSON secret under `session.<account>`,
//! so a crash can never leave an access token on disk without its refresh
//! token. Older releases wrote each token under its own key; those keys are
//! purged whenever the canonical entry is written or found missing.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use warden_common::security::{KeychainError, SecretStore};
use warden_common::time::Clock;
use warden_domain::{
    Session, WardenError, DEFAULT_EXPIRY_MARGIN_SECS, LEGACY_KEY_PREFIXES, SESSION_KEY_PREFIX,
};

use crate::errors::InfraError;

#[derive(Debug, Clone)]
enum Cached {
    /// Backend not consulted yet (or the last read failed).
    Unknown,
    Absent,
    Present(Session),
}

/// Durable home of the current [`Session`].
///
/// Reads are served from memory once the backend has been consulted. Writes
/// go to memory first and then to the backend, so a failing keychain never
/// makes the in-process view lag behind the latest tokens.
pub struct CredentialStore {
    backend: Arc<dyn SecretStore>,
    account: String,
    cache: RwLock<Cached>,
    clock: Arc<dyn Clock>,
    margin_secs: i64,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn SecretStore>, account: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            account: account.into(),
            cache: RwLock::new(Cached::Unknown),
            clock,
            margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
        }
    }

    /// Treat tokens as expired this many seconds before their real expiry.
    pub fn with_expiry_margin(mut self, margin_secs: i64) -> Self {
        self.margin_secs = margin_secs.max(0);
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn session_key(&self) -> String {
        format!("{}{}", SESSION_KEY_PREFIX, self.account)
    }

    fn legacy_keys(&self) -> impl Iterator<Item = String> + '_ {
        LEGACY_KEY_PREFIXES.iter().map(move |prefix| format!("{}{}", prefix, self.account))
    }

    /// The stored session, if any.
    ///
    /// Missing, unreadable and corrupt entries all read as "no session"; a
    /// corrupt entry is logged and then treated as absent.
    pub fn load(&self) -> Option<Session> {
        match &*self.cache.read() {
            Cached::Present(session) => return Some(session.clone()),
            Cached::Absent => return None,
            Cached::Unknown => {}
        }

        let mut cache = self.cache.write();
        // Another caller may have resolved the cache while we waited.
        match &*cache {
            Cached::Present(session) => return Some(session.clone()),
            Cached::Absent => return None,
            Cached::Unknown => {}
        }

        match self.backend.get_secret(&self.session_key()) {
            Ok(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) if session.validate().is_ok() => {
                    debug!(account = %self.account, "loaded session from secret store");
                    *cache = Cached::Present(session.clone());
                    Some(session)
                }
                Ok(_) => {
                    warn!(account = %self.account, "stored session is incomplete; ignoring it");
                    *cache = Cached::Absent;
                    None
                }
                Err(err) => {
                    warn!(account = %self.account, error = %err, "stored session is corrupt; ignoring it");
                    *cache = Cached::Absent;
                    None
                }
            },
            Err(KeychainError::NotFound) => {
                *cache = Cached::Absent;
                drop(cache);
                self.purge_legacy();
                None
            }
            Err(err) => {
                warn!(account = %self.account, error = %err, "failed to read session from secret store");
                None
            }
        }
    }

    /// Replace the stored session with `session` as one unit.
    ///
    /// # Errors
    /// `WardenError::InvalidInput` if the session breaks the pairing
    /// invariant (nothing is stored), `WardenError::Storage` if the backend
    /// write fails (the in-memory copy is still updated).
    pub fn store(&self, session: &Session) -> Result<(), WardenError> {
        session.validate()?;
        let payload = serde_json::to_string(session).map_err(InfraError::from)?;

        {
            let mut cache = self.cache.write();
            *cache = Cached::Present(session.clone());
            self.backend.set_secret(&self.session_key(), &payload).map_err(|err| {
                warn!(account = %self.account, error = %err, "failed to persist session");
                WardenError::from(InfraError::from(err))
            })?;
        }

        debug!(account = %self.account, "session persisted");
        self.purge_legacy();
        Ok(())
    }

    /// Remove the session from memory and from the backend.
    ///
    /// # Errors
    /// `WardenError::Storage` if any backend delete fails. Memory is cleared
    /// regardless.
    pub fn clear(&self) -> Result<(), WardenError> {
        let mut cache = self.cache.write();
        *cache = Cached::Absent;

        let mut first_error = None;
        for key in std::iter::once(self.session_key()).chain(self.legacy_keys()) {
            if let Err(err) = self.backend.delete_secret(&key) {
                warn!(account = %self.account, %key, error = %err, "failed to delete secret");
                first_error.get_or_insert(err);
            }
        }
        drop(cache);

        match first_error {
            Some(err) => Err(InfraError::from(err).into()),
            None => {
                info!(account = %self.account, "session cleared");
                Ok(())
            }
        }
    }

    /// Whether `session`'s access token should be considered expired now.
    pub fn is_expired(&self, session: &Session) -> bool {
        session.is_expired_at(self.clock.utc_now(), self.margin_secs)
    }

    fn purge_legacy(&self) {
        for key in self.legacy_keys() {
            if let Err(err) = self.backend.delete_secret(&key) {
                debug!(%key, error = %err, "failed to delete legacy secret");
            }
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("account", &self.account)
            .field("margin_secs", &self.margin_secs)
            .finish_non_exhaustive()
    }
}
