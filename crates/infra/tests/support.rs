use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use warden_common::security::SecretStore;
use warden_common::testing::{MockClock, MockKeychainProvider};
use warden_domain::{Config, Session};
use warden_infra::auth::SessionEvent;
use warden_infra::ApiClient;
use wiremock::MockServer;

pub const SESSION_KEY: &str = "session.default";

/// Client wired to in-memory secrets and a controllable clock.
pub struct TestClient {
    pub client: Arc<ApiClient>,
    pub secrets: MockKeychainProvider,
    pub clock: MockClock,
}

impl TestClient {
    pub fn new(server: &MockServer) -> Self {
        Self::with_config(config_for(&server.uri()))
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, |builder| builder)
    }

    pub fn build(
        config: Config,
        customize: impl FnOnce(warden_infra::ApiClientBuilder) -> warden_infra::ApiClientBuilder,
    ) -> Self {
        let secrets = MockKeychainProvider::new("warden-test");
        let clock = MockClock::new();
        let builder = ApiClient::builder(config)
            .secret_store(Arc::new(secrets.clone()))
            .clock(Arc::new(clock.clone()));
        let client = customize(builder).build().expect("client should build");
        Self { client: Arc::new(client), secrets, clock }
    }

    /// Persist `session` as if a previous run had logged in.
    pub fn seed(&self, session: &Session) {
        let payload = serde_json::to_string(session).expect("session serializes");
        self.secrets.set_secret(SESSION_KEY, &payload).expect("seed session");
    }

    pub fn stored_session(&self) -> Option<Session> {
        self.secrets.peek(SESSION_KEY).map(|raw| serde_json::from_str(&raw).expect("stored session"))
    }
}

/// Configuration pointing at `base_url` with fast retries.
pub fn config_for(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.timeout_secs = 5;
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config
}

pub fn session(access: &str, csrf: Option<&str>) -> Session {
    let session = Session::new(access, "refresh-1", Utc::now(), 900);
    match csrf {
        Some(token) => session.with_csrf_token(token),
        None => session,
    }
}

pub fn token_body(access: &str, csrf: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access,
        "refresh_token": "refresh-1",
        "expires_in": 900
    });
    if let Some(token) = csrf {
        body["csrf_token"] = json!(token);
    }
    body
}

pub fn bearer(access: &str) -> String {
    format!("Bearer {}", access)
}

/// Next session event, failing the test if none arrives in time.
pub async fn next_event(
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("session event should arrive")
        .expect("event channel open")
}
