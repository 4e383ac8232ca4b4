//! Domain types and models

pub mod auth;
pub mod envelope;
pub mod session;

pub use auth::{Credentials, IssuedAt, TokenResponse};
pub use envelope::{ErrorEnvelope, FieldError};
pub use session::Session;
