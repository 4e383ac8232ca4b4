//! Session management: storage, timeouts, signing and token refresh

pub mod credential_store;
pub mod endpoints;
pub mod events;
pub mod refresh;
pub mod session_clock;
pub mod signer;

pub use credential_store::CredentialStore;
pub use endpoints::{AuthEndpoints, TokenRefresher};
pub use events::{SessionEndReason, SessionEvent, SessionEvents};
pub use refresh::{RefreshCoordinator, RefreshStatus};
pub use session_clock::{ExpiryKind, SessionClock, SessionPhase};
pub use signer::sign;
