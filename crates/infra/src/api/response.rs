//! Buffered API responses

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::errors::ApiError;

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Turn the response into `T`, or into the backend's error.
    ///
    /// 204/205 and empty bodies decode from JSON `null`, so `()` and
    /// `Option<_>` work for endpoints that return nothing.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if !self.status.is_success() {
            return Err(ApiError::from_response(self.status, &String::from_utf8_lossy(&self.body)));
        }

        let no_content = self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::RESET_CONTENT
            || self.body.iter().all(u8::is_ascii_whitespace);

        if no_content {
            serde_json::from_value(serde_json::Value::Null).map_err(|_| {
                ApiError::Decode(format!(
                    "empty response ({}) cannot be decoded into the requested type",
                    self.status.as_u16()
                ))
            })
        } else {
            serde_json::from_slice(&self.body)
                .map_err(|e| ApiError::Decode(format!("failed to parse response: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Profile {
        email: String,
    }

    #[test]
    fn decodes_json_body() {
        let profile: Profile = response(200, r#"{"email":"a@example.com"}"#).decode().unwrap();
        assert_eq!(profile, Profile { email: "a@example.com".into() });
    }

    #[test]
    fn empty_bodies_decode_as_null() {
        response(204, "").decode::<()>().unwrap();
        let nothing: Option<Profile> = response(200, "").decode().unwrap();
        assert_eq!(nothing, None);

        let err = response(204, "").decode::<Profile>().unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn non_success_becomes_api_error() {
        let err = response(409, r#"{"error_code":"CONFLICT","message":"exists"}"#)
            .decode::<Profile>()
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert!(matches!(err, ApiError::Api { ref code, .. } if code == "CONFLICT"));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = response(200, "{oops").decode::<Profile>().unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
