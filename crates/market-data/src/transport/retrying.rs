//! HTTP transport with bounded exponential-backoff retries.
//!
//! The retry loop is an explicit attempt counter. Every attempt produces an
//! [`AttemptOutcome`] and the loop decides from that tag alone, so each branch
//! can be exercised without a live network (see [`run_with_retry`]).

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;

use super::rate_limiter::RateLimiter;
use crate::errors::{MarketDataError, RetryClass};

/// Hard ceiling on attempts regardless of configuration.
pub const MAX_TOTAL_ATTEMPTS: u32 = 10;

/// Default per-attempt HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest response body kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Retry configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub retry_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Total attempts allowed, first attempt included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1).min(MAX_TOTAL_ATTEMPTS)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(1 << exponent)
    }
}

/// Result of a single attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// Transient failure; the string is the cause reported if retries run out.
    Retryable(String),
    Terminal(MarketDataError),
}

impl<T> AttemptOutcome<T> {
    /// Retry or stop according to the error's [`RetryClass`].
    pub fn from_error(error: MarketDataError) -> Self {
        match error.retry_class() {
            RetryClass::WithBackoff => Self::Retryable(error.to_string()),
            RetryClass::Never => Self::Terminal(error),
        }
    }
}

/// Drive `attempt` until it succeeds, fails terminally, or the policy's
/// attempt budget is spent.
///
/// `attempt` receives the 1-based attempt number.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, MarketDataError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptOutcome<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt_no = 1;

    loop {
        match attempt(attempt_no).await {
            AttemptOutcome::Success(value) => return Ok(value),
            AttemptOutcome::Terminal(error) => return Err(error),
            AttemptOutcome::Retryable(cause) => {
                if attempt_no >= max_attempts {
                    return Err(MarketDataError::Transport {
                        attempts: attempt_no,
                        cause,
                    });
                }

                let delay = policy.delay_for(attempt_no);
                warn!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt_no, max_attempts, cause, delay
                );
                tokio::time::sleep(delay).await;
                attempt_no += 1;
            }
        }
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

/// GET-only JSON transport bound to one base URL.
pub struct RetryingTransport {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(client: Client, base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET and return the response body.
    ///
    /// When `limiter` is given, every attempt (retries included) first waits
    /// for a permit. Network errors, 429 and 5xx are retried; any other
    /// non-success status fails at once with [`MarketDataError::Rejected`].
    pub async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
        limiter: Option<&RateLimiter>,
    ) -> Result<String, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);

        run_with_retry(&self.policy, |attempt| {
            let request = self.client.get(&url).query(params);
            let url = &url;
            async move {
                if let Some(limiter) = limiter {
                    limiter.acquire().await;
                }
                debug!("GET {} (attempt {})", url, attempt);

                let response = match request.send().await {
                    Ok(response) => response,
                    Err(e) => return AttemptOutcome::Retryable(e.to_string()),
                };

                let status = response.status();
                if status.is_success() {
                    return match response.text().await {
                        Ok(body) => AttemptOutcome::Success(body),
                        Err(e) => AttemptOutcome::Retryable(e.to_string()),
                    };
                }

                let body = response.text().await.unwrap_or_default();
                AttemptOutcome::from_error(MarketDataError::Rejected {
                    status: status.as_u16(),
                    body: truncate_body(body),
                })
            }
        })
        .await
    }
}
