//! Structured error payload returned by the backend on non-2xx responses

use serde::{Deserialize, Serialize};

/// `{error_code, message, status_code, field_errors?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_code: String,
    pub message: String,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub field_errors: Option<Vec<FieldError>>,
}

/// Validation failure for a single input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(default)]
    pub code: String,
}
