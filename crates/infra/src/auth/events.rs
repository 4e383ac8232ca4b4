//! Session lifecycle notifications
//!
//! The client never touches UI or navigation. It announces that a session
//! is about to time out or has ended, and whoever embeds it decides what to
//! do (show a warning, route to a login screen, ...).

use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The refresh endpoint rejected the refresh token.
    RefreshFailed,
    /// A refresh was needed but no refresh token was stored.
    NoRefreshToken,
    /// A request replayed with freshly refreshed tokens was still rejected.
    ReplayRejected,
    /// No user activity within the idle timeout.
    IdleTimeout,
    /// The session outlived its absolute lifetime.
    AbsoluteTimeout,
    /// Explicit logout.
    Logout,
}

impl SessionEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefreshFailed => "refresh_failed",
            Self::NoRefreshToken => "no_refresh_token",
            Self::ReplayRejected => "replay_rejected",
            Self::IdleTimeout => "idle_timeout",
            Self::AbsoluteTimeout => "absolute_timeout",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session will end for inactivity after `remaining` unless activity
    /// is recorded.
    IdleWarning { remaining: Duration },
    /// The session is over; the user has to log in again.
    Ended { reason: SessionEndReason },
}

/// Fan-out channel for [`SessionEvent`]s.
///
/// Cloning shares the channel. Emitting with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers, "session event delivered"),
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "session event dropped (no subscribers)");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let events = SessionEvents::default();
        let mut a = events.subscribe();
        let mut b = events.subscribe();

        events.emit(SessionEvent::Ended { reason: SessionEndReason::Logout });

        let expected = SessionEvent::Ended { reason: SessionEndReason::Logout };
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        let events = SessionEvents::new(0);
        events.emit(SessionEvent::IdleWarning { remaining: Duration::from_secs(60) });
        assert_eq!(events.subscriber_count(), 0);
    }

    #[test]
    fn reasons_have_stable_names() {
        assert_eq!(SessionEndReason::RefreshFailed.to_string(), "refresh_failed");
        assert_eq!(SessionEndReason::IdleTimeout.as_str(), "idle_timeout");
    }
}
