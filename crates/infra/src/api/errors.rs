//! API-specific error types
//!
//! Provides error classification for API operations with retry metadata.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use warden_domain::{ErrorEnvelope, FieldError, WardenError};

/// Categories of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Transport failures and timeouts - retried by the network policy
    Network,
    /// No usable session - the caller must log in again
    Authentication,
    /// The backend answered with a non-2xx response - never retried
    Application,
    /// Client misconfiguration, undecodable payloads, cancellation
    Config,
}

/// Errors surfaced by [`ApiClient`](super::ApiClient)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("API error {status} ({code}): {message}")]
    Api { status: u16, code: String, message: String, field_errors: Vec<FieldError> },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Unauthenticated(_) => ApiErrorCategory::Authentication,
            Self::Api { .. } => ApiErrorCategory::Application,
            Self::Decode(_) | Self::Config(_) | Self::Cancelled => ApiErrorCategory::Config,
        }
    }

    /// Timeouts count as network errors for retry purposes.
    pub fn is_transient(&self) -> bool {
        self.category() == ApiErrorCategory::Network
    }

    /// HTTP status for application errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an application error from a non-2xx response body.
    ///
    /// Bodies that are not a structured error envelope still produce an
    /// error, with a code derived from the status.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self::Api {
                status: status.as_u16(),
                code: envelope.error_code,
                message: envelope.message,
                field_errors: envelope.field_errors.unwrap_or_default(),
            },
            Err(_) => {
                let message = if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("unknown status").to_string()
                } else {
                    body.trim().to_string()
                };
                Self::Api {
                    status: status.as_u16(),
                    code: format!("HTTP_{}", status.as_u16()),
                    message,
                    field_errors: Vec::new(),
                }
            }
        }
    }

    /// Map a transport failure for a request sent with `timeout`.
    pub fn from_transport(err: WardenError, timeout: Duration) -> Self {
        match err {
            WardenError::Timeout(_) => Self::Timeout(timeout),
            other => other.into(),
        }
    }
}

impl From<WardenError> for ApiError {
    fn from(err: WardenError) -> Self {
        match err {
            WardenError::Network(message) | WardenError::Timeout(message) => {
                Self::Network(message)
            }
            WardenError::Auth(message) => Self::Unauthenticated(message),
            WardenError::Serialization(message) => Self::Decode(message),
            WardenError::Config(message) | WardenError::InvalidInput(message) => {
                Self::Config(message)
            }
            WardenError::Storage(message) | WardenError::Internal(message) => {
                Self::Config(message)
            }
        }
    }
}
