//! Request descriptors for the API client

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::errors::ApiError;
use super::response::RawResponse;
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Everything needed to (re)send one API call.
///
/// Descriptors are cheap to clone so a call can be re-signed and replayed
/// after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    /// Overrides the client-wide timeout for this call.
    pub timeout: Option<Duration>,
    /// Public endpoints are sent without credentials and never refreshed.
    pub public: bool,
    pub id: Uuid,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            public: false,
            id: Uuid::new_v4(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Config(format!("Failed to serialize body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    /// POST, PUT, PATCH and DELETE change server state and carry CSRF.
    pub fn is_mutating(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
    }

    pub fn summary(&self) -> RequestSummary {
        RequestSummary { id: self.id, method: self.method.clone(), path: self.path.clone() }
    }

    pub(crate) fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if self.path.starts_with('/') {
            format!("{}{}", base, self.path)
        } else {
            format!("{}/{}", base, self.path)
        }
    }

    pub(crate) fn to_builder(&self, http: &HttpClient, base_url: &str) -> RequestBuilder {
        let mut builder =
            http.request(self.method.clone(), self.url(base_url)).headers(self.headers.clone());
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if let Some(body) = &self.body {
            builder = builder.json(body);
        }
        builder
    }

    /// Send this request once through `http` (network retries included)
    /// and buffer the response.
    pub(crate) async fn send(
        &self,
        http: &HttpClient,
        base_url: &str,
    ) -> Result<RawResponse, ApiError> {
        let timeout = self.timeout.unwrap_or_else(|| http.timeout());
        let response = http
            .send_with_timeout(self.to_builder(http, base_url), timeout)
            .await
            .map_err(|err| ApiError::from_transport(err, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| ApiError::from_transport(InfraError::from(err).into(), timeout))?;

        debug!(request = %self.summary(), %status, bytes = body.len(), "response received");
        Ok(RawResponse { status, headers, body: body.to_vec() })
    }
}

/// Loggable identity of a request; never carries headers or body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub id: Uuid,
    pub method: Method,
    pub path: String,
}

impl fmt::Display for RequestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
