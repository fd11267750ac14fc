//! # Retry Middleware
//!
//! A `reqwest-middleware` layer that bounds every attempt with a timeout and
//! retries transient failures:
//!
//! - transport errors and attempt timeouts,
//! - `429 Too Many Requests` (honouring `Retry-After` when present),
//! - any `5xx`.
//!
//! Every other status is handed straight back to the caller. Retry state is a
//! plain attempt counter inside a bounded loop.
//!
//! The timeout covers the whole exchange: the body is read into memory inside
//! the attempt, so a server that sends headers and then stalls costs one
//! attempt, not the whole run.
//!
//! When the budget runs out the middleware returns whatever the last attempt
//! produced: the last response for retryable statuses, or the last error for
//! transport failures and timeouts.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use http::Extensions;
use reqwest::header::RETRY_AFTER;
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Error, Middleware, Next, Result};
use tracing::{debug, warn};

use super::backoff::{parse_retry_after, BackoffPolicy};

/// Default number of attempts, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
/// Default per-attempt timeout.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Raised when a single attempt exceeds its timeout. The in-flight request is
/// dropped before this error is produced.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("attempt timed out after {0:?}")]
pub struct AttemptTimeout(pub Duration);

/// Returns `true` for statuses worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Reads the `Retry-After` header of a response, if any.
pub fn retry_after_hint(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_retry_after(value, Utc::now()))
}

/// Reads the whole body and rebuilds the response around the buffered bytes,
/// keeping status, version and headers.
async fn buffer_body(response: Response) -> Result<Response> {
    let status = response.status();
    let version = response.version();
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    let mut buffered = http::Response::new(body);
    *buffered.status_mut() = status;
    *buffered.version_mut() = version;
    *buffered.headers_mut() = headers;
    Ok(Response::from(buffered))
}

/// # Retry Middleware
///
/// See the module docs for the retry classification.
#[derive(Debug, Clone)]
pub struct RetryAfterMiddleware {
    policy: BackoffPolicy,
    max_attempts: u32,
    attempt_timeout: Duration,
}

impl Default for RetryAfterMiddleware {
    fn default() -> Self {
        Self::new(BackoffPolicy::default(), DEFAULT_MAX_ATTEMPTS, DEFAULT_ATTEMPT_TIMEOUT)
    }
}

impl RetryAfterMiddleware {
    /// Creates the middleware. `max_attempts` below 1 is raised to 1.
    pub fn new(policy: BackoffPolicy, max_attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            policy,
            max_attempts: max_attempts.max(1),
            attempt_timeout,
        }
    }

    /// Total attempts made before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[async_trait]
impl Middleware for RetryAfterMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let mut attempt: u32 = 1;

        loop {
            let duplicate = req.try_clone().ok_or_else(|| {
                Error::Middleware(anyhow!(
                    "Request object is not cloneable. Are you passing a streaming body?"
                ))
            })?;

            let outcome = tokio::time::timeout(self.attempt_timeout, async {
                match next.clone().run(duplicate, extensions).await {
                    Ok(response) => buffer_body(response).await,
                    Err(err) => Err(err),
                }
            })
            .await;

            let hint = match outcome {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if !is_retryable_status(status) || attempt >= self.max_attempts {
                        debug!(url = %req.url(), %status, attempt, "request settled");
                        return Ok(response);
                    }
                    let hint = if status == StatusCode::TOO_MANY_REQUESTS {
                        retry_after_hint(&response)
                    } else {
                        None
                    };
                    warn!(
                        url = %req.url(),
                        %status,
                        attempt,
                        max_attempts = self.max_attempts,
                        retry_after = ?hint,
                        "retryable status"
                    );
                    hint
                }
                Ok(Err(err)) => {
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    warn!(
                        url = %req.url(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "transport failure"
                    );
                    None
                }
                Err(_) => {
                    if attempt >= self.max_attempts {
                        return Err(Error::Middleware(AttemptTimeout(self.attempt_timeout).into()));
                    }
                    warn!(
                        url = %req.url(),
                        attempt,
                        max_attempts = self.max_attempts,
                        timeout = ?self.attempt_timeout,
                        "attempt timed out"
                    );
                    None
                }
            };

            let delay = self.policy.compute_delay(attempt, hint);
            debug!(url = %req.url(), attempt, ?delay, "backing off");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
