//! Authenticated API client
//!
//! Every call is signed with the stored session. A 401 routes the call
//! through the refresh coordinator and replays it once with the new tokens;
//! a second 401 ends the session. Network failures are retried by the
//! transport, application errors are surfaced as they are.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use warden_common::security::{KeychainProvider, SecretStore};
use warden_common::time::{Clock, SystemClock};
use warden_domain::{Config, Credentials, Session};

use super::errors::ApiError;
use super::request::ApiRequest;
use super::response::RawResponse;
use super::retry_policy::NetworkRetryPolicy;
use crate::auth::{
    sign, AuthEndpoints, CredentialStore, ExpiryKind, RefreshCoordinator, RefreshStatus,
    SessionClock, SessionEndReason, SessionEvent, SessionEvents, SessionPhase, TokenRefresher,
};
use crate::http::HttpClient;

/// HTTP client facade with transparent session handling.
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    endpoints: Arc<AuthEndpoints>,
    session_clock: Arc<SessionClock>,
    events: SessionEvents,
    proactive_refresh: bool,
    watchdog_interval: Duration,
}

impl ApiClient {
    pub fn builder(config: Config) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Client backed by the platform keychain and the system clock.
    ///
    /// # Errors
    /// `ApiError::Config` if the configuration is invalid.
    pub fn from_config(config: Config) -> Result<Self, ApiError> {
        Self::builder(config).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform `request` and decode the response body into `T`.
    ///
    /// # Errors
    /// - `ApiError::Unauthenticated` when there is no usable session; the
    ///   backend is not contacted in that case
    /// - `ApiError::Network` / `ApiError::Timeout` once network retries are
    ///   exhausted
    /// - `ApiError::Api` for any other non-2xx response
    /// - `ApiError::Decode` when the body does not match `T`
    #[instrument(skip(self, request), fields(request = %request.summary()))]
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        if request.public {
            return request.send(&self.http, &self.base_url).await?.decode();
        }

        self.enforce_timeouts()?;

        let Some(mut session) = self.store.load() else {
            debug!("no stored session; not contacting backend");
            return Err(ApiError::Unauthenticated("no active session".into()));
        };
        self.session_clock.ensure_started();

        let mut refreshed = false;
        if self.proactive_refresh && self.store.is_expired(&session) {
            debug!("access token about to expire; refreshing before sending");
            session = self.refreshed_session(&session.access_token, &request).await?;
            refreshed = true;
        }

        let mut response = self.send_signed(&request, &session).await?;

        if response.is_unauthorized() && !refreshed {
            debug!("access token rejected; refreshing");
            session = self.refreshed_session(&session.access_token, &request).await?;
            response = self.send_signed(&request, &session).await?;
        }

        if response.is_unauthorized() {
            warn!("request rejected with refreshed credentials; ending session");
            self.teardown(SessionEndReason::ReplayRejected);
            return Err(ApiError::Unauthenticated(
                "credentials rejected after refresh".into(),
            ));
        }

        response.decode()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Log in with email and password and make the result the current
    /// session.
    ///
    /// A session that cannot be persisted is still used for this process.
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let session = self.endpoints.login(credentials).await?;

        if let Err(err) = self.store.store(&session) {
            warn!(error = %err, "logged in but the session could not be persisted");
        }
        self.coordinator.reset(&session);
        self.session_clock.start_session();

        info!("session started");
        Ok(session)
    }

    /// End the session locally and tell the backend in the background.
    ///
    /// Returns `false` if there was no session to end. The backend call is
    /// only made when a Tokio runtime is available.
    pub fn logout(&self) -> bool {
        let session = self.store.load();
        let ended = self.teardown(SessionEndReason::Logout);

        if let Some(session) = session {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let endpoints = Arc::clone(&self.endpoints);
                    handle.spawn(async move {
                        if let Err(err) = endpoints.logout(&session).await {
                            debug!(error = %err, "backend logout failed");
                        }
                    });
                }
                Err(_) => debug!("no runtime available; skipping backend logout"),
            }
        }

        ended
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.load().is_some()
    }

    /// Note user activity for idle tracking. Bursts are debounced.
    pub fn record_activity(&self) -> bool {
        self.session_clock.record_activity()
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.session_clock.phase()
    }

    pub fn refresh_status(&self) -> RefreshStatus {
        self.coordinator.status()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Watch the session clock in the background: warn once per idle window
    /// and end the session when a timeout passes.
    ///
    /// The task stops by itself once the client is dropped.
    pub fn spawn_session_watchdog(self: &Arc<Self>) -> JoinHandle<()> {
        let client: Weak<Self> = Arc::downgrade(self);
        let period = self.watchdog_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut warned = false;

            loop {
                ticker.tick().await;
                let Some(client) = client.upgrade() else {
                    debug!("client dropped; stopping session watchdog");
                    break;
                };

                match client.session_clock.phase() {
                    SessionPhase::IdleWarning { remaining } => {
                        if !warned {
                            info!(?remaining, "session idle; warning");
                            client.events.emit(SessionEvent::IdleWarning { remaining });
                            warned = true;
                        }
                    }
                    SessionPhase::Expired(kind) => {
                        client.teardown(end_reason(kind));
                        warned = false;
                    }
                    SessionPhase::Active | SessionPhase::Inactive => warned = false,
                }
            }
        })
    }

    fn enforce_timeouts(&self) -> Result<(), ApiError> {
        match self.session_clock.phase() {
            SessionPhase::Expired(kind) => {
                let reason = end_reason(kind);
                self.teardown(reason);
                Err(ApiError::Unauthenticated(format!("session ended ({})", reason)))
            }
            _ => Ok(()),
        }
    }

    async fn refreshed_session(
        &self,
        stale_access_token: &str,
        request: &ApiRequest,
    ) -> Result<Session, ApiError> {
        let result = self.coordinator.refresh(Some(stale_access_token), request.summary()).await;
        if matches!(result, Err(ApiError::Unauthenticated(_))) {
            self.session_clock.end_session();
        }
        result
    }

    async fn send_signed(
        &self,
        request: &ApiRequest,
        session: &Session,
    ) -> Result<RawResponse, ApiError> {
        sign(request, session)?.send(&self.http, &self.base_url).await
    }

    fn teardown(&self, reason: SessionEndReason) -> bool {
        self.session_clock.end_session();
        self.coordinator.end_session(reason)
    }
}

fn end_reason(kind: ExpiryKind) -> SessionEndReason {
    match kind {
        ExpiryKind::Idle => SessionEndReason::IdleTimeout,
        ExpiryKind::Absolute => SessionEndReason::AbsoluteTimeout,
    }
}

/// Builder for [`ApiClient`]; every collaborator can be swapped for tests.
pub struct ApiClientBuilder {
    config: Config,
    secret_store: Option<Arc<dyn SecretStore>>,
    clock: Option<Arc<dyn Clock>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    watchdog_interval: Option<Duration>,
}

impl ApiClientBuilder {
    pub fn new(config: Config) -> Self {
        Self { config, secret_store: None, clock: None, refresher: None, watchdog_interval: None }
    }

    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secret_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the `/auth/refresh` call.
    pub fn token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config;
        config.validate().map_err(|e| ApiError::Config(e.to_string()))?;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let secret_store: Arc<dyn SecretStore> = match self.secret_store {
            Some(store) => store,
            None => Arc::new(KeychainProvider::new(config.storage.service_name.clone())),
        };

        let mut http = HttpClient::builder()
            .timeout(config.api.timeout())
            .retry_policy(NetworkRetryPolicy::from_settings(&config.retry));
        if let Some(agent) = &config.api.user_agent {
            http = http.user_agent(agent.clone());
        }
        let http = http.build().map_err(|e| ApiError::Config(e.to_string()))?;

        let base_url = config.api.base_url.trim_end_matches('/').to_string();
        let store = Arc::new(
            CredentialStore::new(secret_store, config.storage.account.clone(), clock.clone())
                .with_expiry_margin(config.session.expiry_margin_secs),
        );
        let endpoints = Arc::new(AuthEndpoints::new(http.clone(), base_url.clone(), clock.clone()));
        let refresher: Arc<dyn TokenRefresher> = match self.refresher {
            Some(refresher) => refresher,
            None => endpoints.clone(),
        };
        let events = SessionEvents::default();
        let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), refresher, events.clone()));
        let session_clock = Arc::new(SessionClock::new(clock, &config.session));

        debug!(%base_url, account = %config.storage.account, "api client ready");

        Ok(ApiClient {
            http,
            base_url,
            store,
            coordinator,
            endpoints,
            session_clock,
            events,
            proactive_refresh: config.session.proactive_refresh,
            watchdog_interval: self
                .watchdog_interval
                .unwrap_or_else(|| config.session.watchdog_interval()),
        })
    }
}
