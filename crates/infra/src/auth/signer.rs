//! Attaches credentials to outgoing requests

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use warden_domain::{Session, BEARER_PREFIX, CSRF_HEADER};

use crate::api::errors::ApiError;
use crate::api::request::ApiRequest;

/// Return a copy of `request` carrying `Authorization: Bearer <token>` and,
/// for mutating methods, the session's CSRF token.
///
/// Headers are replaced rather than appended, so signing an already signed
/// request (for example when replaying after a refresh) yields the same
/// header set as signing the original.
///
/// # Errors
/// Returns `ApiError::Unauthenticated` if a token cannot be expressed as an
/// HTTP header value.
pub fn sign(request: &ApiRequest, session: &Session) -> Result<ApiRequest, ApiError> {
    let mut signed = request.clone();

    let mut bearer = header_value(&format!("{}{}", BEARER_PREFIX, session.access_token))?;
    bearer.set_sensitive(true);
    signed.headers.insert(AUTHORIZATION, bearer);

    let csrf_name = HeaderName::from_static(CSRF_HEADER);
    match session.csrf_token.as_deref() {
        Some(csrf) if signed.is_mutating() => {
            let mut value = header_value(csrf)?;
            value.set_sensitive(true);
            signed.headers.insert(csrf_name, value);
        }
        _ => {
            signed.headers.remove(csrf_name);
        }
    }

    Ok(signed)
}

fn header_value(raw: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(raw)
        .map_err(|_| ApiError::Unauthenticated("stored token is not a valid header value".into()))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn session(csrf: Option<&str>) -> Session {
        let issued_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let session = Session::new("access-1", "refresh-1", issued_at, 900);
        match csrf {
            Some(token) => session.with_csrf_token(token),
            None => session,
        }
    }

    #[test]
    fn adds_bearer_token() {
        let signed = sign(&ApiRequest::get("/profile"), &session(None)).unwrap();
        assert_eq!(signed.headers.get(AUTHORIZATION).unwrap(), "Bearer access-1");
        assert!(signed.headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert!(signed.headers.get(CSRF_HEADER).is_none());
    }

    #[test]
    fn csrf_only_on_mutating_methods() {
        let session = session(Some("csrf-1"));

        let get = sign(&ApiRequest::get("/users"), &session).unwrap();
        assert!(get.headers.get(CSRF_HEADER).is_none());

        for request in [
            ApiRequest::post("/users"),
            ApiRequest::put("/users/1"),
            ApiRequest::patch("/users/1"),
            ApiRequest::delete("/users/1"),
        ] {
            let signed = sign(&request, &session).unwrap();
            assert_eq!(signed.headers.get(CSRF_HEADER).unwrap(), "csrf-1");
        }
    }

    #[test]
    fn signing_is_idempotent() {
        let session = session(Some("csrf-1"));
        let request = ApiRequest::post("/users");

        let once = sign(&request, &session).unwrap();
        let twice = sign(&once, &session).unwrap();

        assert_eq!(once.headers, twice.headers);
        assert_eq!(twice.headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(twice.headers.get_all(CSRF_HEADER).iter().count(), 1);
    }

    #[test]
    fn resigning_replaces_old_credentials() {
        let stale = sign(&ApiRequest::post("/users"), &session(Some("csrf-1"))).unwrap();
        let fresh_session = Session::new("access-2", "refresh-2", Utc::now(), 900);

        let replayed = sign(&stale, &fresh_session).unwrap();

        assert_eq!(replayed.headers.get(AUTHORIZATION).unwrap(), "Bearer access-2");
        assert!(replayed.headers.get(CSRF_HEADER).is_none());
    }

    #[test]
    fn rejects_tokens_that_are_not_header_safe() {
        let broken = Session::new("line\nbreak", "refresh", Utc::now(), 900);
        assert!(matches!(
            sign(&ApiRequest::get("/profile"), &broken),
            Err(ApiError::Unauthenticated(_))
        ));
    }
}
