//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Warden
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum WardenError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardenError {
    /// Whether the error came from the transport layer and may succeed on a
    /// later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Result type alias for Warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_network_class() {
        assert!(WardenError::Network("reset".into()).is_transient());
        assert!(WardenError::Timeout("30s".into()).is_transient());
        assert!(!WardenError::Auth("nope".into()).is_transient());
        assert!(!WardenError::Storage("locked".into()).is_transient());
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(WardenError::Config("missing".into())).unwrap();
        assert_eq!(json["type"], "Config");
        assert_eq!(json["message"], "missing");
    }
}
