use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::{debug, warn};
use warden_common::resilience::{RetryError, RetryExecutor};
use warden_domain::{WardenError, DEFAULT_REQUEST_TIMEOUT_SECS};

use crate::api::retry_policy::NetworkRetryPolicy;
use crate::errors::InfraError;

/// HTTP client with per-attempt timeouts and network-level retry.
///
/// Only transport failures are retried. Every HTTP response, whatever its
/// status, is returned to the caller on the first attempt that produced it.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
    policy: NetworkRetryPolicy,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, WardenError> {
        Self::builder().build()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &NetworkRetryPolicy {
        &self.policy
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder with the client-wide timeout.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, WardenError> {
        self.send_with_timeout(builder, self.timeout).await
    }

    /// Execute the provided request builder with retry semantics; each
    /// attempt is aborted after `timeout`.
    ///
    /// # Errors
    /// Returns the last transport error once the retry policy gives up, or
    /// `WardenError::Internal` if the body cannot be replayed.
    pub async fn send_with_timeout(
        &self,
        builder: RequestBuilder,
        timeout: Duration,
    ) -> Result<Response, WardenError> {
        let builder = builder.timeout(timeout);
        let executor = RetryExecutor::new(self.policy.retry_config(), self.policy.clone());
        let client = &self.client;
        let mut attempt = 0u32;

        let result = executor
            .execute(|| {
                attempt += 1;
                let current = attempt;
                let prepared = prepare(&builder);

                async move {
                    let request = prepared?;
                    let method = request.method().clone();
                    let path = request.url().path().to_string();
                    debug!(attempt = current, %method, %path, "sending HTTP request");

                    match tokio::time::timeout(timeout, client.execute(request)).await {
                        Ok(Ok(response)) => {
                            let status = response.status();
                            debug!(attempt = current, %method, %path, %status, "received HTTP response");
                            Ok(response)
                        }
                        Ok(Err(err)) => {
                            debug!(attempt = current, %method, %path, error = %err, "HTTP request failed");
                            Err(WardenError::from(InfraError::from(err)))
                        }
                        Err(_) => {
                            debug!(attempt = current, %method, %path, ?timeout, "HTTP request timed out");
                            Err(WardenError::Timeout(format!("no response within {timeout:?}")))
                        }
                    }
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::AttemptsExhausted { attempts, source } => {
                warn!(attempts, error = %source, "HTTP request failed after all attempts");
                source
            }
            RetryError::NonRetryable { source } => source,
            RetryError::TimeoutExceeded { elapsed } => {
                WardenError::Timeout(format!("retries exceeded {elapsed:?}"))
            }
            RetryError::InvalidConfiguration { message } => WardenError::Config(message),
        })
    }
}

fn prepare(builder: &RequestBuilder) -> Result<reqwest::Request, WardenError> {
    let cloned = builder.try_clone().ok_or_else(|| {
        WardenError::Internal(
            "request body cannot be cloned; buffer the body to enable retries".into(),
        )
    })?;
    cloned.build().map_err(|err| InfraError::from(err).into())
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    policy: NetworkRetryPolicy,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            policy: NetworkRetryPolicy::default(),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: NetworkRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, WardenError> {
        let mut builder = ReqwestClient::builder().no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|err| WardenError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client, timeout: self.timeout, policy: self.policy })
    }
}
