//! Application constants
//!
//! Centralized location for domain-level constants: backend endpoints,
//! header names and timing defaults.

// Backend auth endpoints
pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";

// Headers
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const BEARER_PREFIX: &str = "Bearer ";

// Request defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

// Retry policy defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

// Session defaults
pub const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 30;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_ABSOLUTE_TIMEOUT_SECS: u64 = 8 * 60 * 60;
pub const DEFAULT_IDLE_WARNING_SECS: u64 = 60;
pub const DEFAULT_ACTIVITY_DEBOUNCE_MS: u64 = 1_000;
pub const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 15;

// Credential storage
pub const DEFAULT_SERVICE_NAME: &str = "warden";
pub const DEFAULT_ACCOUNT: &str = "default";
pub const SESSION_KEY_PREFIX: &str = "session.";

/// Key prefixes written by older clients that split one session across
/// several entries. They are deleted whenever the canonical entry changes.
pub const LEGACY_KEY_PREFIXES: &[&str] = &["access.", "refresh.", "metadata.", "csrf."];
