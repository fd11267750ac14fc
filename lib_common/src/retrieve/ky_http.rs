//! # HTTP Retrieval Utilities
//!
//! This module provides a resilient, asynchronous API client wrapper around `reqwest`.
//! Every request goes through [`RetryAfterMiddleware`], so callers get per-attempt
//! timeouts, exponential backoff and `Retry-After` handling for free, and only
//! deal with the final outcome:
//!
//! - `2xx` → `Ok(ApiResponse { success: true, data: Some(..) })`
//! - other non-retryable status → `Ok(ApiResponse { success: false, .. })`
//! - retry budget spent → `Err(FetchError::..)`
//!
//! An optional [`Relay`] rewrites every outbound URL so requests can be routed
//! through a pass-through proxy.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ORIGIN};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;

use super::backoff::BackoffPolicy;
use super::retry::{
    is_retryable_status, AttemptTimeout, RetryAfterMiddleware, DEFAULT_ATTEMPT_TIMEOUT,
    DEFAULT_MAX_ATTEMPTS,
};

/// Errors surfaced once the client has given up on a request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The underlying `reqwest::Client` could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The last attempt failed at the transport level.
    #[error("request to {url} failed after {attempts} attempts: {source}")]
    Transport {
        /// Upstream URL (before relay wrapping).
        url: String,
        /// Attempts made.
        attempts: u32,
        /// Last transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The last attempt exceeded the per-attempt timeout.
    #[error("request to {url} timed out after {attempts} attempts ({timeout:?} each)")]
    Timeout {
        /// Upstream URL (before relay wrapping).
        url: String,
        /// Attempts made.
        attempts: u32,
        /// Per-attempt timeout.
        timeout: Duration,
    },

    /// Every attempt ended in a retryable status (429 or 5xx).
    #[error("request to {url} still returned {status} after {attempts} attempts")]
    RetriesExhausted {
        /// Upstream URL (before relay wrapping).
        url: String,
        /// Status of the last response.
        status: u16,
        /// Attempts made.
        attempts: u32,
    },

    /// A successful response carried a body that did not match the expected shape.
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        /// Upstream URL (before relay wrapping).
        url: String,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// Any other middleware failure.
    #[error("middleware error for {url}: {message}")]
    Middleware {
        /// Upstream URL (before relay wrapping).
        url: String,
        /// Rendered error.
        message: String,
    },
}

/// A standardized container for API responses.
///
/// This struct wraps the deserialized data along with metadata about the
/// HTTP transaction, such as status codes and headers.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// # Relay
///
/// Pass-through proxy that receives the target URL percent-encoded after a
/// fixed prefix, e.g. `https://relay.example/?url=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    prefix: String,
}

impl Relay {
    /// Creates a relay from its URL prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Wraps `target` so it is fetched through the relay.
    pub fn wrap(&self, target: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        format!("{}{}", self.prefix, encoded)
    }
}

/// Construction options for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientOptions {
    /// Attempts per request, the first one included.
    pub max_attempts: u32,
    /// Bound on each individual attempt.
    pub attempt_timeout: Duration,
    /// Delay policy between attempts.
    pub backoff: BackoffPolicy,
    /// Optional relay every URL is routed through.
    pub relay: Option<Relay>,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            backoff: BackoffPolicy::default(),
            relay: None,
        }
    }
}

/// A resilient asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`; the retry behaviour lives entirely in
/// the middleware stack, this type only maps the final outcome.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// Optional relay wrapping every outbound URL.
    relay: Option<Relay>,
    /// Attempts the middleware makes before giving up.
    max_attempts: u32,
    /// Per-attempt timeout, kept for error reporting.
    attempt_timeout: Duration,
}

impl ApiClient {
    /// Creates a new `ApiClient` with the retry middleware installed.
    ///
    /// Every request carries `Origin: null`, which the relay expects.
    ///
    /// # Errors
    /// Returns [`FetchError::Build`] if the TLS backend cannot be initialised.
    pub fn new(options: ApiClientOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("null"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(FetchError::Build)?;

        let retry = RetryAfterMiddleware::new(
            options.backoff,
            options.max_attempts,
            options.attempt_timeout,
        );
        let max_attempts = retry.max_attempts();

        let inner = ClientBuilder::new(client).with(retry).build();

        Ok(Self {
            inner,
            relay: options.relay,
            max_attempts,
            attempt_timeout: options.attempt_timeout,
        })
    }

    /// The URL actually requested for `target`, after relay wrapping.
    pub fn outbound_url(&self, target: &str) -> String {
        match &self.relay {
            Some(relay) => relay.wrap(target),
            None => target.to_string(),
        }
    }

    /// Issues a GET for `url`, retrying transient failures, and decodes a
    /// successful body as JSON into `T`.
    ///
    /// # Errors
    /// See [`FetchError`]. Non-retryable error statuses are *not* errors; they
    /// come back as `ApiResponse { success: false, .. }` after a single call.
    pub async fn fetch_with_retry<T>(&self, url: &str) -> Result<ApiResponse<T>, FetchError>
    where
        T: DeserializeOwned,
    {
        let outbound = self.outbound_url(url);

        let response = match self.inner.get(&outbound).send().await {
            Ok(response) => response,
            Err(reqwest_middleware::Error::Reqwest(source)) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    attempts: self.max_attempts,
                    source,
                });
            }
            Err(reqwest_middleware::Error::Middleware(err)) => {
                return Err(match err.downcast::<AttemptTimeout>() {
                    Ok(AttemptTimeout(timeout)) => FetchError::Timeout {
                        url: url.to_string(),
                        attempts: self.max_attempts,
                        timeout,
                    },
                    Err(other) => FetchError::Middleware {
                        url: url.to_string(),
                        message: other.to_string(),
                    },
                });
            }
        };

        let status = response.status();
        let headers = response.headers().clone();

        if status.is_success() {
            // buffered inside the timed attempt, so this does not touch the network
            let body = response.bytes().await.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                attempts: self.max_attempts,
                source,
            })?;
            let data = serde_json::from_slice::<T>(&body).map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })?;
            return Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers,
            });
        }

        if is_retryable_status(status) {
            return Err(FetchError::RetriesExhausted {
                url: url.to_string(),
                status: status.as_u16(),
                attempts: self.max_attempts,
            });
        }

        // Capture the error body as a string for debugging
        let error_body = response.text().await.ok();
        Ok(ApiResponse {
            data: None,
            error_body,
            status: status.as_u16(),
            success: false,
            headers,
        })
    }

    /// Per-attempt timeout this client was built with.
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }
}
