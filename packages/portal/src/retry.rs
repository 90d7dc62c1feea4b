//! HTTP retry helper with a per-dependency policy.
//!
//! Fetchers should call [`send_json`] instead of
//! `reqwest::RequestBuilder::send()` directly so every request gets the
//! same transient-error handling (timeouts, connection resets, HTTP 429,
//! HTTP 5xx).
//!
//! The two remote services this system talks to deliberately use different
//! default policies: losing a single record page is cheap (the run carries
//! on with partial data), while losing a parcel batch silently removes a
//! whole block of geometry from the map. Rather than hard-coding that
//! asymmetry, each client owns a [`RetryPolicy`] so the discipline can be
//! tuned per dependency.

use std::time::Duration;

/// How long to wait before retry attempt `n` (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// No delay between attempts.
    None,
    /// `step`, `2*step`, `3*step`, …
    Linear(Duration),
    /// `base`, `2*base`, `4*base`, …
    Exponential(Duration),
}

impl Backoff {
    /// Returns the delay to sleep before the given retry attempt (1-based).
    #[must_use]
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Linear(step) => step * attempt,
            Self::Exponential(base) => base * 2u32.saturating_pow(attempt.saturating_sub(1)),
        }
    }
}

/// Retry policy for one remote dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (so `1` means "no retry").
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// A single attempt with no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::None,
        }
    }

    /// `max_attempts` total attempts with linearly increasing delays.
    #[must_use]
    pub const fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(step),
        }
    }

    /// `max_attempts` total attempts with exponentially increasing delays.
    #[must_use]
    pub const fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential(base),
        }
    }
}

/// Errors from a retried HTTP call.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// The request failed at the transport level after all attempts.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server kept returning a retryable status until attempts ran out,
    /// or returned a permanent (4xx) status.
    #[error("HTTP {status} after {attempts} attempt(s)")]
    Status {
        /// Final status code observed.
        status: reqwest::StatusCode,
        /// Number of attempts made.
        attempts: u32,
    },
}

impl RetryError {
    /// Returns `true` when the failure was a server-side error class (5xx)
    /// or a transport failure — the classes callers may treat as "the
    /// service was unavailable" rather than "the request was wrong".
    #[must_use]
    pub fn is_server_side(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
        }
    }
}

/// Sends an HTTP request and parses the response body as JSON, retrying
/// per `policy`.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`),
/// so any request shape can be retried.
///
/// Retries transport errors, HTTP 429, and HTTP 5xx. Other 4xx statuses
/// are permanent and fail immediately.
///
/// # Errors
///
/// Returns [`RetryError`] when attempts are exhausted or a permanent
/// status is returned.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    policy: RetryPolicy,
    build_request: F,
) -> Result<serde_json::Value, RetryError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        if attempt > 1 {
            let delay = policy.backoff.delay(attempt - 1);
            log::warn!("  retry {}/{} in {delay:?}...", attempt - 1, max_attempts - 1);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_attempts {
                    log::warn!("  transient error: {e}");
                    continue;
                }
                return Err(RetryError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < max_attempts {
                        log::warn!("  HTTP {status}");
                        continue;
                    }
                    return Err(RetryError::Status { status, attempts: attempt });
                }

                if status.is_client_error() {
                    return Err(RetryError::Status { status, attempts: attempt });
                }

                return Ok(response.json().await?);
            }
        }
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_backoff_increases_by_step() {
        let backoff = Backoff::Linear(Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(500));
        assert_eq!(backoff.delay(2), Duration::from_millis(1000));
        assert_eq!(backoff.delay(3), Duration::from_millis(1500));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let backoff = Backoff::Exponential(Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn none_policy_is_single_attempt() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff.delay(1), Duration::ZERO);
    }

    #[test]
    fn server_side_classification() {
        let err = RetryError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            attempts: 3,
        };
        assert!(err.is_server_side());

        let err = RetryError::Status {
            status: reqwest::StatusCode::BAD_REQUEST,
            attempts: 1,
        };
        assert!(!err.is_server_side());
    }
}
