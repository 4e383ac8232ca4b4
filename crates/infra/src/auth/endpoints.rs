//! Login, refresh and logout calls against the auth backend

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use warden_common::time::Clock;
use warden_domain::{
    Credentials, Session, TokenResponse, BEARER_PREFIX, CSRF_HEADER, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH,
};

use super::signer;
use crate::api::errors::ApiError;
use crate::api::request::ApiRequest;
use crate::api::response::RawResponse;
use crate::http::HttpClient;

/// Exchanges a refresh token for a new session.
///
/// This seam lets the refresh coordinator be driven by a fake in tests.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<Session, ApiError>;
}

/// The backend's `/auth/*` endpoints.
///
/// These calls are public: they never go through the signer's refresh path,
/// so a failing refresh cannot recurse into another refresh.
pub struct AuthEndpoints {
    http: HttpClient,
    base_url: String,
    clock: Arc<dyn Clock>,
}

impl AuthEndpoints {
    pub fn new(http: HttpClient, base_url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self { http, base_url: base_url.into(), clock }
    }

    #[instrument(skip_all)]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).public().json(credentials)?;
        let response = request.send(&self.http, &self.base_url).await?;
        let session = self.session_from(&response, None)?;
        info!("login succeeded");
        Ok(session)
    }

    /// Tell the backend to revoke `session`. Failures are reported but
    /// local teardown never depends on them.
    pub async fn logout(&self, session: &Session) -> Result<(), ApiError> {
        let request = signer::sign(&ApiRequest::post(LOGOUT_PATH).public(), session)?;
        let response = request.send(&self.http, &self.base_url).await?;
        response.decode::<serde_json::Value>().map(|_| ()).inspect_err(|err| {
            warn!(error = %err, "backend rejected logout");
        })
    }

    fn session_from(
        &self,
        response: &RawResponse,
        previous_refresh_token: Option<&str>,
    ) -> Result<Session, ApiError> {
        let payload: TokenResponse = response.decode()?;
        let header_csrf = response.header_str(CSRF_HEADER).map(str::to_string);
        payload
            .into_session(self.clock.utc_now(), previous_refresh_token, header_csrf)
            .map_err(ApiError::from)
    }
}

#[async_trait]
impl TokenRefresher for AuthEndpoints {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<Session, ApiError> {
        let mut bearer = HeaderValue::from_str(&format!("{}{}", BEARER_PREFIX, refresh_token))
            .map_err(|_| ApiError::Unauthenticated("refresh token is not a valid header value".into()))?;
        bearer.set_sensitive(true);
        let request = ApiRequest::post(REFRESH_PATH)
            .public()
            .header(AUTHORIZATION, bearer)
            .json(&json!({ "refresh_token": refresh_token }))?;
        let response = request.send(&self.http, &self.base_url).await?;
        let session = self.session_from(&response, Some(refresh_token))?;
        debug!(expires_in = session.expires_in, "token refresh succeeded");
        Ok(session)
    }
}
