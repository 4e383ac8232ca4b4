//! Authenticated session
//!
//! A [`Session`] is one login's worth of credentials. It is always handled as
//! a whole value: stores replace it wholesale and never patch single fields.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, WardenError};

/// Access/refresh token pair plus expiry metadata for one login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Short-lived bearer token sent on every API call
    pub access_token: String,

    /// Long-lived token used only against the refresh endpoint
    pub refresh_token: String,

    /// When the backend minted `access_token`
    pub issued_at: DateTime<Utc>,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    /// Anti-forgery token attached to mutating requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            issued_at,
            expires_in,
            csrf_token: None,
        }
    }

    #[must_use]
    pub fn with_csrf_token(mut self, csrf_token: impl Into<String>) -> Self {
        self.csrf_token = Some(csrf_token.into());
        self
    }

    /// Absolute expiry of the access token, or `None` when `expires_in`
    /// does not fit in a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        TimeDelta::try_seconds(self.expires_in)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
    }

    /// `true` when the access token is expired at `now`, or will be within
    /// `margin_secs`. An unrepresentable expiry counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        let deadline = TimeDelta::try_seconds(margin_secs)
            .and_then(|margin| now.checked_add_signed(margin));
        match (deadline, self.expires_at()) {
            (Some(deadline), Some(expires_at)) => deadline >= expires_at,
            _ => true,
        }
    }

    /// Seconds until the access token expires (negative once expired).
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at().map(|expires_at| (expires_at - now).num_seconds())
    }

    /// Whether a refresh token is present.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Check the pairing invariant: an access token is never held without a
    /// refresh token.
    ///
    /// # Errors
    /// Returns `WardenError::InvalidInput` when a token is empty or the
    /// lifetime is negative or too large to compute an expiry from.
    pub fn validate(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(WardenError::InvalidInput("session has no access token".into()));
        }
        if self.refresh_token.is_empty() {
            return Err(WardenError::InvalidInput("session has no refresh token".into()));
        }
        if self.expires_in < 0 {
            return Err(WardenError::InvalidInput(format!(
                "session lifetime must not be negative (got {})",
                self.expires_in
            )));
        }
        if self.expires_at().is_none() {
            return Err(WardenError::InvalidInput(format!(
                "session lifetime is out of range (got {})",
                self.expires_in
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}
