//! Authenticated API client for the Warden backend
//!
//! # Architecture
//!
//! - `request`/`response`: transport-neutral request descriptors and
//!   buffered responses
//! - `retry_policy`: network-level retry, orthogonal to authentication
//! - `client`: the facade that signs, refreshes and replays

pub mod client;
pub mod errors;
pub mod request;
pub mod response;
pub mod retry_policy;

pub use client::{ApiClient, ApiClientBuilder};
pub use errors::{ApiError, ApiErrorCategory};
pub use request::{ApiRequest, RequestSummary};
pub use response::RawResponse;
pub use retry_policy::NetworkRetryPolicy;
