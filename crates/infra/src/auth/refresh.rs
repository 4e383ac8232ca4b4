//! Single-flight token refresh
//!
//! However many requests discover an expired token at once, exactly one
//! refresh call is sent to the backend. Everyone else subscribes to its
//! outcome and is answered in arrival order.
//!
//! ```text
//!   Idle ──401──▶ Refreshing ──new tokens──▶ Idle
//!                    │  ▲
//!                    │  └── further 401s queue up
//!                    └──rejected──▶ Failed ──login──▶ Idle
//! ```
//!
//! The refresh itself runs on its own task, so a caller that gives up
//! (dropped future, timeout) never cancels the refresh other callers are
//! waiting on.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use warden_domain::Session;

use super::credential_store::CredentialStore;
use super::endpoints::TokenRefresher;
use super::events::{SessionEndReason, SessionEvent, SessionEvents};
use crate::api::errors::ApiError;
use crate::api::request::RequestSummary;

type Outcome = Result<Session, ApiError>;

/// A request parked until the in-flight refresh resolves.
struct PendingRequest {
    request: RequestSummary,
    responder: oneshot::Sender<Outcome>,
}

impl PendingRequest {
    fn resolve(self, outcome: Outcome) {
        if self.responder.send(outcome).is_err() {
            debug!(request = %self.request, "requester went away before the refresh finished");
        }
    }
}

enum RefreshState {
    Idle,
    Refreshing { cycle: u64, subscribers: VecDeque<PendingRequest> },
    /// Terminal until the next login.
    Failed { reason: SessionEndReason },
}

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Idle,
    Refreshing { waiting: usize },
    Failed(SessionEndReason),
}

pub struct RefreshCoordinator {
    store: Arc<CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    events: SessionEvents,
    state: Mutex<RefreshState>,
    next_cycle: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        events: SessionEvents,
    ) -> Self {
        Self {
            store,
            refresher,
            events,
            state: Mutex::new(RefreshState::Idle),
            next_cycle: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> RefreshStatus {
        match &*self.state.lock() {
            RefreshState::Idle => RefreshStatus::Idle,
            RefreshState::Refreshing { subscribers, .. } => {
                RefreshStatus::Refreshing { waiting: subscribers.len() }
            }
            RefreshState::Failed { reason } => RefreshStatus::Failed(*reason),
        }
    }

    /// Obtain a session newer than the one whose access token was
    /// `stale_access_token`.
    ///
    /// If the stored session has already moved on (someone else refreshed),
    /// it is returned without contacting the backend. Otherwise this joins
    /// the in-flight refresh or starts one.
    ///
    /// # Errors
    /// `ApiError::Unauthenticated` once the session cannot be recovered,
    /// the refresh call's own error when it failed on the network, and
    /// `ApiError::Cancelled` if the coordinator is dropped mid-refresh.
    pub async fn refresh(
        self: &Arc<Self>,
        stale_access_token: Option<&str>,
        request: RequestSummary,
    ) -> Result<Session, ApiError> {
        let receiver = {
            let mut state = self.state.lock();
            match &mut *state {
                RefreshState::Failed { reason } => return Err(unauthenticated(*reason)),
                RefreshState::Refreshing { subscribers, .. } => {
                    let (responder, receiver) = oneshot::channel();
                    debug!(%request, position = subscribers.len() + 1, "joining in-flight refresh");
                    subscribers.push_back(PendingRequest { request, responder });
                    receiver
                }
                RefreshState::Idle => {
                    let session = match self.store.load() {
                        Some(session) if session.can_refresh() => session,
                        _ => {
                            let reason = SessionEndReason::NoRefreshToken;
                            warn!(%request, "refresh needed but no refresh token is stored");
                            let (_, pending) = self.fail_locked(&mut state, reason);
                            drop(state);
                            reject_all(pending, reason);
                            return Err(unauthenticated(reason));
                        }
                    };

                    if stale_access_token.is_some_and(|stale| stale != session.access_token) {
                        debug!(%request, "session already refreshed; reusing it");
                        return Ok(session);
                    }

                    let cycle = self.next_cycle.fetch_add(1, Ordering::Relaxed) + 1;
                    let (responder, receiver) = oneshot::channel();
                    info!(%request, cycle, "starting token refresh");
                    *state = RefreshState::Refreshing {
                        cycle,
                        subscribers: VecDeque::from([PendingRequest { request, responder }]),
                    };

                    let this = Arc::clone(self);
                    let refresh_token = session.refresh_token;
                    tokio::spawn(async move {
                        let outcome = this.refresher.refresh(&refresh_token).await;
                        this.complete(cycle, outcome);
                    });
                    receiver
                }
            }
        };

        receiver.await.unwrap_or(Err(ApiError::Cancelled))
    }

    fn complete(&self, cycle: u64, outcome: Outcome) {
        let mut state = self.state.lock();
        let subscribers = match &mut *state {
            RefreshState::Refreshing { cycle: current, subscribers } if *current == cycle => {
                std::mem::take(subscribers)
            }
            _ => {
                debug!(cycle, "discarding result of a superseded refresh");
                return;
            }
        };

        match outcome {
            Ok(session) => {
                if let Err(err) = self.store.store(&session) {
                    warn!(error = %err, "refreshed session could not be persisted");
                }
                *state = RefreshState::Idle;
                drop(state);

                info!(cycle, waiting = subscribers.len(), "token refresh succeeded");
                for pending in subscribers {
                    pending.resolve(Ok(session.clone()));
                }
            }
            Err(err) if err.is_transient() => {
                *state = RefreshState::Idle;
                drop(state);

                warn!(cycle, error = %err, "token refresh did not reach the backend; session kept");
                for pending in subscribers {
                    pending.resolve(Err(err.clone()));
                }
            }
            Err(err) => {
                let reason = SessionEndReason::RefreshFailed;
                warn!(cycle, error = %err, "token refresh rejected; ending session");
                let (_, rest) = self.fail_locked(&mut state, reason);
                drop(state);

                reject_all(subscribers, reason);
                reject_all(rest, reason);
            }
        }
    }

    /// Tear the session down for `reason`.
    ///
    /// Returns `true` if this call ended the session, `false` if it had
    /// already ended or there never was one; `SessionEvent::Ended` is
    /// emitted only in the former case.
    pub fn end_session(&self, reason: SessionEndReason) -> bool {
        let (ended, pending) = {
            let mut state = self.state.lock();
            if matches!(*state, RefreshState::Idle) && self.store.load().is_none() {
                debug!(%reason, "no session to end");
                return false;
            }
            self.fail_locked(&mut state, reason)
        };
        reject_all(pending, reason);
        ended
    }

    /// Leave `Failed` after a successful login. Anyone still waiting on a
    /// refresh gets the new session.
    pub fn reset(&self, session: &Session) {
        let previous = std::mem::replace(&mut *self.state.lock(), RefreshState::Idle);
        if let RefreshState::Refreshing { subscribers, .. } = previous {
            for pending in subscribers {
                pending.resolve(Ok(session.clone()));
            }
        }
    }

    /// Move to `Failed`, clear stored credentials and announce the end of
    /// the session. Hands back any subscribers still queued so they can be
    /// rejected once the lock is released.
    fn fail_locked(
        &self,
        state: &mut RefreshState,
        reason: SessionEndReason,
    ) -> (bool, VecDeque<PendingRequest>) {
        if matches!(state, RefreshState::Failed { .. }) {
            return (false, VecDeque::new());
        }

        let pending = match std::mem::replace(state, RefreshState::Failed { reason }) {
            RefreshState::Refreshing { subscribers, .. } => subscribers,
            _ => VecDeque::new(),
        };

        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear stored credentials");
        }
        info!(%reason, "session ended");
        self.events.emit(SessionEvent::Ended { reason });
        (true, pending)
    }
}

fn unauthenticated(reason: SessionEndReason) -> ApiError {
    ApiError::Unauthenticated(format!("session ended ({})", reason))
}

fn reject_all(pending: VecDeque<PendingRequest>, reason: SessionEndReason) {
    for request in pending {
        request.resolve(Err(unauthenticated(reason)));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::Utc;
    use tokio::sync::Semaphore;
    use warden_common::testing::{MockClock, MockKeychainProvider};

    use super::*;
    use crate::api::request::ApiRequest;

    struct FakeRefresher {
        calls: AtomicUsize,
        gate: Semaphore,
        outcome: Mutex<Outcome>,
    }

    impl FakeRefresher {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), gate: Semaphore::new(0), outcome: Mutex::new(outcome) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn release(&self) {
            self.gate.add_permits(1);
        }
    }

    #[async_trait::async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<Session, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(refresh_token, "refresh-1");
            self.gate.acquire().await.expect("gate closed").forget();
            self.outcome.lock().clone()
        }
    }

    fn session(access: &str) -> Session {
        Session::new(access, "refresh-1", Utc::now(), 900)
    }

    struct Harness {
        coordinator: Arc<RefreshCoordinator>,
        store: Arc<CredentialStore>,
        refresher: Arc<FakeRefresher>,
        events: SessionEvents,
    }

    fn harness(stored: Option<Session>, outcome: Outcome) -> Harness {
        let store = Arc::new(CredentialStore::new(
            Arc::new(MockKeychainProvider::default()),
            "default",
            Arc::new(MockClock::new()),
        ));
        if let Some(session) = stored {
            store.store(&session).unwrap();
        }
        let refresher = FakeRefresher::new(outcome);
        let events = SessionEvents::default();
        let coordinator =
            Arc::new(RefreshCoordinator::new(store.clone(), refresher.clone(), events.clone()));
        Harness { coordinator, store, refresher, events }
    }

    fn summary() -> RequestSummary {
        ApiRequest::get("/profile").summary()
    }

    async fn wait_for_waiters(coordinator: &RefreshCoordinator, waiting: usize) {
        while coordinator.status() != (RefreshStatus::Refreshing { waiting }) {
            tokio::task::yield_now().await;
        }
    }

    /// Validates concurrent refresh scenario.
    ///
    /// Assertions:
    /// - Ten concurrent callers produce exactly one backend refresh
    /// - Every caller receives the refreshed session
    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let h = harness(Some(session("access-1")), Ok(session("access-2")));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let coordinator = h.coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator.refresh(Some("access-1"), summary()).await
            }));
        }

        wait_for_waiters(&h.coordinator, 10).await;
        h.refresher.release();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().access_token, "access-2");
        }
        assert_eq!(h.refresher.calls(), 1);
        assert_eq!(h.coordinator.status(), RefreshStatus::Idle);
        assert_eq!(h.store.load().unwrap().access_token, "access-2");
    }

    #[tokio::test]
    async fn stale_token_reuses_current_session() {
        let h = harness(Some(session("access-2")), Ok(session("access-3")));

        let refreshed = h.coordinator.refresh(Some("access-1"), summary()).await.unwrap();

        assert_eq!(refreshed.access_token, "access-2");
        assert_eq!(h.refresher.calls(), 0);
    }

    /// Validates rejected refresh scenario.
    ///
    /// Assertions:
    /// - All waiters are rejected as unauthenticated
    /// - Credentials are cleared and one `Ended` event is emitted
    /// - Later calls fail fast without contacting the backend
    #[tokio::test]
    async fn rejected_refresh_ends_session_once() {
        let rejection = ApiError::from_response(reqwest::StatusCode::UNAUTHORIZED, "");
        let h = harness(Some(session("access-1")), Err(rejection));
        let mut events = h.events.subscribe();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let coordinator = h.coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator.refresh(Some("access-1"), summary()).await
            }));
        }
        wait_for_waiters(&h.coordinator, 3).await;
        h.refresher.release();

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Err(ApiError::Unauthenticated(_))));
        }
        assert_eq!(h.store.load(), None);
        assert_eq!(
            h.coordinator.status(),
            RefreshStatus::Failed(SessionEndReason::RefreshFailed)
        );
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Ended { reason: SessionEndReason::RefreshFailed }
        );
        assert!(events.try_recv().is_err());

        let again = h.coordinator.refresh(Some("access-1"), summary()).await;
        assert!(matches!(again, Err(ApiError::Unauthenticated(_))));
        assert_eq!(h.refresher.calls(), 1);
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_backend_call() {
        let h = harness(None, Ok(session("access-2")));
        let mut events = h.events.subscribe();

        let result = h.coordinator.refresh(None, summary()).await;

        assert!(matches!(result, Err(ApiError::Unauthenticated(_))));
        assert_eq!(h.refresher.calls(), 0);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Ended { reason: SessionEndReason::NoRefreshToken }
        );
    }

    #[tokio::test]
    async fn network_failure_keeps_session() {
        let h = harness(Some(session("access-1")), Err(ApiError::Network("reset".into())));
        let mut events = h.events.subscribe();
        h.refresher.release();

        let result = h.coordinator.refresh(Some("access-1"), summary()).await;

        assert_eq!(result, Err(ApiError::Network("reset".into())));
        assert_eq!(h.coordinator.status(), RefreshStatus::Idle);
        assert_eq!(h.store.load().unwrap().access_token, "access-1");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn abandoned_waiter_does_not_disturb_others() {
        let h = harness(Some(session("access-1")), Ok(session("access-2")));

        let first = {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move { coordinator.refresh(Some("access-1"), summary()).await })
        };
        let abandoned = {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move { coordinator.refresh(Some("access-1"), summary()).await })
        };
        let last = {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move { coordinator.refresh(Some("access-1"), summary()).await })
        };

        wait_for_waiters(&h.coordinator, 3).await;
        abandoned.abort();
        assert!(abandoned.await.unwrap_err().is_cancelled());
        h.refresher.release();

        assert_eq!(first.await.unwrap().unwrap().access_token, "access-2");
        assert_eq!(last.await.unwrap().unwrap().access_token, "access-2");
        assert_eq!(h.refresher.calls(), 1);
    }

    #[tokio::test]
    async fn end_session_emits_only_once() {
        let h = harness(Some(session("access-1")), Ok(session("access-2")));
        let mut events = h.events.subscribe();

        assert!(h.coordinator.end_session(SessionEndReason::IdleTimeout));
        assert!(!h.coordinator.end_session(SessionEndReason::Logout));

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Ended { reason: SessionEndReason::IdleTimeout }
        );
        assert!(events.try_recv().is_err());
        assert_eq!(h.store.load(), None);
    }

    #[tokio::test]
    async fn ending_without_a_session_is_silent() {
        let h = harness(None, Ok(session("access-2")));
        let mut events = h.events.subscribe();

        assert!(!h.coordinator.end_session(SessionEndReason::Logout));

        assert!(events.try_recv().is_err());
        assert_eq!(h.coordinator.status(), RefreshStatus::Idle);
    }

    #[tokio::test]
    async fn login_reset_leaves_failed_state() {
        let h = harness(Some(session("access-1")), Ok(session("access-2")));
        h.coordinator.end_session(SessionEndReason::Logout);

        let fresh = session("access-9");
        h.store.store(&fresh).unwrap();
        h.coordinator.reset(&fresh);

        assert_eq!(h.coordinator.status(), RefreshStatus::Idle);
        let reused = h.coordinator.refresh(Some("access-1"), summary()).await.unwrap();
        assert_eq!(reused.access_token, "access-9");
    }
}
