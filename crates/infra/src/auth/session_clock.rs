//! Idle and absolute session timeouts
//!
//! Timestamps are wall-clock milliseconds taken from an injected [`Clock`]
//! and kept in atomics, so activity can be recorded from any thread without
//! locking. A value of `0` means "not set".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use warden_common::time::Clock;
use warden_domain::SessionSettings;

/// Which timeout ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryKind {
    Idle,
    Absolute,
}

/// Where the current session stands with respect to its timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session has been started.
    Inactive,
    Active,
    /// Inside the warning window before the idle timeout.
    IdleWarning { remaining: Duration },
    Expired(ExpiryKind),
}

pub struct SessionClock {
    clock: Arc<dyn Clock>,
    idle_timeout: Duration,
    absolute_timeout: Duration,
    idle_warning: Duration,
    debounce: Duration,
    last_activity_ms: AtomicU64,
    session_start_ms: AtomicU64,
}

impl SessionClock {
    pub fn new(clock: Arc<dyn Clock>, settings: &SessionSettings) -> Self {
        Self {
            clock,
            idle_timeout: settings.idle_timeout(),
            absolute_timeout: settings.absolute_timeout(),
            idle_warning: settings.idle_warning(),
            debounce: settings.activity_debounce(),
            last_activity_ms: AtomicU64::new(0),
            session_start_ms: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        // Never report 0, which is the "unset" marker.
        self.clock.millis_since_epoch().max(1)
    }

    /// Note user activity. Calls within the debounce window of the last
    /// recorded activity are coalesced; returns whether this call was
    /// recorded.
    pub fn record_activity(&self) -> bool {
        let now = self.now_ms();
        let last = self.last_activity_ms.load(Ordering::Acquire);
        if last != 0 && now.saturating_sub(last) < duration_ms(self.debounce) {
            return false;
        }
        self.last_activity_ms
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `true` when no activity was recorded within `threshold`.
    pub fn is_idle(&self, threshold: Duration) -> bool {
        match self.last_activity_ms.load(Ordering::Acquire) {
            0 => false,
            last => self.now_ms().saturating_sub(last) >= duration_ms(threshold),
        }
    }

    /// `true` when a session started at `session_start_ms` is older than
    /// `threshold`.
    pub fn is_absolute_expired(&self, session_start_ms: u64, threshold: Duration) -> bool {
        self.now_ms().saturating_sub(session_start_ms) >= duration_ms(threshold)
    }

    /// Begin a new session now. Counts as activity.
    pub fn start_session(&self) {
        let now = self.now_ms();
        self.session_start_ms.store(now, Ordering::Release);
        self.last_activity_ms.store(now, Ordering::Release);
        debug!("session clock started");
    }

    /// Start the clock for a session restored from storage, unless one is
    /// already running.
    pub fn ensure_started(&self) {
        let now = self.now_ms();
        if self
            .session_start_ms
            .compare_exchange(0, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.last_activity_ms.store(now, Ordering::Release);
            debug!("session clock resumed for stored session");
        }
    }

    pub fn end_session(&self) {
        self.session_start_ms.store(0, Ordering::Release);
        self.last_activity_ms.store(0, Ordering::Release);
    }

    pub fn session_start_ms(&self) -> Option<u64> {
        match self.session_start_ms.load(Ordering::Acquire) {
            0 => None,
            start => Some(start),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn absolute_timeout(&self) -> Duration {
        self.absolute_timeout
    }

    /// Evaluate Active → IdleWarning → Expired for the running session.
    /// Absolute expiry wins over idle expiry.
    pub fn phase(&self) -> SessionPhase {
        let Some(start) = self.session_start_ms() else {
            return SessionPhase::Inactive;
        };

        if self.is_absolute_expired(start, self.absolute_timeout) {
            return SessionPhase::Expired(ExpiryKind::Absolute);
        }
        if self.is_idle(self.idle_timeout) {
            return SessionPhase::Expired(ExpiryKind::Idle);
        }

        let warn_after = self.idle_timeout.saturating_sub(self.idle_warning);
        if self.is_idle(warn_after) {
            let last = self.last_activity_ms.load(Ordering::Acquire);
            let idle_for = Duration::from_millis(self.now_ms().saturating_sub(last));
            return SessionPhase::IdleWarning {
                remaining: self.idle_timeout.saturating_sub(idle_for),
            };
        }

        SessionPhase::Active
    }
}

impl std::fmt::Debug for SessionClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClock")
            .field("idle_timeout", &self.idle_timeout)
            .field("absolute_timeout", &self.absolute_timeout)
            .field("session_start_ms", &self.session_start_ms())
            .finish_non_exhaustive()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
