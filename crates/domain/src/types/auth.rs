//! Login request and token response payloads

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::session::Session;
use crate::errors::{Result, WardenError};

/// Epoch values above this are taken to be milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// `issued_at` as sent by the backend: epoch seconds/millis or RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IssuedAt {
    Epoch(i64),
    Timestamp(DateTime<Utc>),
}

impl IssuedAt {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Epoch(value) if *value > EPOCH_MILLIS_THRESHOLD => {
                Utc.timestamp_millis_opt(*value).single()
            }
            Self::Epoch(value) => Utc.timestamp_opt(*value, 0).single(),
        }
    }
}

/// Token payload returned by `/auth/login` and `/auth/refresh`.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub issued_at: Option<IssuedAt>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

impl TokenResponse {
    /// Build a [`Session`] from this payload.
    ///
    /// `received_at` stands in for a missing or unreadable `issued_at`.
    /// `previous_refresh_token` is kept when a refresh response does not
    /// rotate the refresh token, and `header_csrf` is used when the body
    /// carries no CSRF token.
    ///
    /// # Errors
    /// Returns `WardenError::Auth` when the result would violate the session
    /// invariants (for example no refresh token at all).
    pub fn into_session(
        self,
        received_at: DateTime<Utc>,
        previous_refresh_token: Option<&str>,
        header_csrf: Option<String>,
    ) -> Result<Session> {
        let issued_at =
            self.issued_at.as_ref().and_then(IssuedAt::resolve).unwrap_or(received_at);

        let refresh_token = self
            .refresh_token
            .filter(|token| !token.is_empty())
            .or_else(|| previous_refresh_token.map(str::to_string))
            .unwrap_or_default();

        let session = Session {
            access_token: self.access_token,
            refresh_token,
            issued_at,
            expires_in: self.expires_in,
            csrf_token: self.csrf_token.or(header_csrf),
        };

        session
            .validate()
            .map_err(|e| WardenError::Auth(format!("backend returned an unusable session: {e}")))?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn accepts_epoch_seconds_and_millis() {
        let seconds: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":900,"issued_at":1767225600}"#,
        )
        .unwrap();
        let millis: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":900,"issued_at":1767225600000}"#,
        )
        .unwrap();

        let a = seconds.into_session(now(), None, None).unwrap();
        let b = millis.into_session(now(), None, None).unwrap();
        assert_eq!(a.issued_at, b.issued_at);
        assert_eq!(a.issued_at.timestamp(), 1_767_225_600);
    }

    #[test]
    fn accepts_rfc3339_issued_at() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":900,"issued_at":"2026-02-01T00:00:00Z"}"#,
        )
        .unwrap();
        let session = response.into_session(now(), None, None).unwrap();
        assert_eq!(session.issued_at, Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn missing_issued_at_uses_receive_time() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":"r","expires_in":900}"#)
                .unwrap();
        let session = response.into_session(now(), None, None).unwrap();
        assert_eq!(session.issued_at, now());
    }

    #[test]
    fn keeps_previous_refresh_token_when_not_rotated() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a2","expires_in":900}"#).unwrap();
        let session = response.into_session(now(), Some("r1"), None).unwrap();
        assert_eq!(session.refresh_token, "r1");
        assert_eq!(session.access_token, "a2");
    }

    #[test]
    fn rejects_login_without_refresh_token() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":900}"#).unwrap();
        assert!(matches!(response.into_session(now(), None, None), Err(WardenError::Auth(_))));
    }

    #[test]
    fn rejects_lifetime_beyond_timestamp_range() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":10000000000000}"#,
        )
        .unwrap();
        assert!(matches!(response.into_session(now(), None, None), Err(WardenError::Auth(_))));
    }

    #[test]
    fn body_csrf_wins_over_header() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":900,"csrf_token":"body"}"#,
        )
        .unwrap();
        let session = response.into_session(now(), None, Some("header".into())).unwrap();
        assert_eq!(session.csrf_token.as_deref(), Some("body"));

        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":"r","expires_in":900}"#)
                .unwrap();
        let session = response.into_session(now(), None, Some("header".into())).unwrap();
        assert_eq!(session.csrf_token.as_deref(), Some("header"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("admin@example.com", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
