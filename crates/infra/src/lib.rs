//! # Warden Infrastructure
//!
//! The authenticated API client and everything it needs at runtime.
//!
//! This crate contains:
//! - The HTTP transport with network-level retry
//! - Session storage, idle/absolute timeouts and request signing
//! - Single-flight token refresh
//! - The [`ApiClient`] facade
//! - Configuration loading and logging bootstrap
//!
//! ## Architecture
//! - Domain types come from `warden-domain`
//! - Retry, clock and secret-store primitives come from `warden-common`
//! - Contains all "impure" code (network, keychain, background tasks)

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{ApiClient, ApiClientBuilder, ApiError, ApiErrorCategory, ApiRequest};
pub use auth::{SessionEndReason, SessionEvent, SessionPhase};
pub use errors::InfraError;
pub use http::HttpClient;
pub use observability::init_tracing;
