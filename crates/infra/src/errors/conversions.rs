//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use serde_json::Error as JsonError;
use warden_common::security::KeychainError;
use warden_domain::WardenError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub WardenError);

impl From<InfraError> for WardenError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<WardenError> for InfraError {
    fn from(value: WardenError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoWardenError {
    fn into_warden(self) -> WardenError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → WardenError */
/* -------------------------------------------------------------------------- */

impl IntoWardenError for HttpError {
    fn into_warden(self) -> WardenError {
        if self.is_timeout() {
            return WardenError::Timeout("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return WardenError::Network(format!("HTTP connection failure: {self}"));
        }

        if self.is_builder() {
            return WardenError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        if self.is_decode() {
            return WardenError::Serialization(format!("failed to decode HTTP body: {self}"));
        }

        // Resets, broken pipes and body read failures all surface as
        // request/body errors and are worth another attempt.
        WardenError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_warden())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → WardenError */
/* -------------------------------------------------------------------------- */

impl IntoWardenError for JsonError {
    fn into_warden(self) -> WardenError {
        WardenError::Serialization(format!(
            "invalid JSON at line {} column {}: {}",
            self.line(),
            self.column(),
            self
        ))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_warden())
    }
}

/* -------------------------------------------------------------------------- */
/* KeychainError → WardenError */
/* -------------------------------------------------------------------------- */

impl IntoWardenError for KeychainError {
    fn into_warden(self) -> WardenError {
        match self {
            KeychainError::NotFound => WardenError::Storage("secret not found".into()),
            KeychainError::AccessFailed(message) => WardenError::Storage(message),
        }
    }
}

impl From<KeychainError> for InfraError {
    fn from(value: KeychainError) -> Self {
        InfraError(value.into_warden())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::Client;

    use super::*;

    #[test]
    fn json_error_maps_to_serialization() {
        let err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let mapped: WardenError = InfraError::from(err).into();
        match mapped {
            WardenError::Serialization(msg) => assert!(msg.contains("line 1")),
            other => panic!("expected serialization error, got {:?}", other),
        }
    }

    #[test]
    fn keychain_errors_map_to_storage() {
        let mapped: WardenError =
            InfraError::from(KeychainError::AccessFailed("locked".into())).into();
        assert_eq!(mapped, WardenError::Storage("locked".into()));
    }

    #[tokio::test]
    async fn refused_connection_maps_to_transient_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://{addr}")).send().await.unwrap_err();

        let mapped: WardenError = InfraError::from(error).into();
        assert!(matches!(mapped, WardenError::Network(_)), "got {mapped:?}");
        assert!(mapped.is_transient());
    }
}
