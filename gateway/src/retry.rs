//! Bounded retry with linear backoff.
//!
//! # Retry Policy
//!
//! - Max retries: 2 (3 total attempts)
//! - Delay before retry *n*: `base_delay * n` (1s, then 2s)
//! - No jitter: delays are deterministic so call counts and timings are testable
//!
//! # Retryable Conditions
//!
//! Only transient failures are retried:
//! [`NetworkError`](dialectic_types::ErrorKind::NetworkError) and
//! [`TimeoutError`](dialectic_types::ErrorKind::TimeoutError). Upstream
//! rejections and quota exhaustion are deterministic for a given payload, so retrying them only burns budget.
//!
//! # Headers
//!
//! - `X-Retry-Count`: 0 for initial, 1+ for retries
//! - `Idempotency-Key`: `dialectic-{uuid}`, same across all attempts

use std::future::Future;
use std::time::Duration;

use reqwest::RequestBuilder;
use uuid::Uuid;

use dialectic_types::GatewayError;

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting the initial attempt).
    pub max_retries: u32,
    /// Unit of the linear backoff.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Delay before retry number `retry` (1-based).
#[must_use]
pub fn backoff_delay(retry: u32, config: &RetryConfig) -> Duration {
    config.base_delay.saturating_mul(retry)
}

/// Add retry-related headers to a request.
///
/// - `retry_count`: 0 for initial request, 1+ for retries
/// - `idempotency_key`: same key across all attempts
pub fn add_retry_headers(
    builder: RequestBuilder,
    retry_count: u32,
    idempotency_key: &str,
) -> RequestBuilder {
    builder
        .header("X-Retry-Count", retry_count.to_string())
        .header("Idempotency-Key", idempotency_key)
}

#[must_use]
pub fn generate_idempotency_key() -> String {
    format!("dialectic-{}", Uuid::new_v4())
}

/// Outcome of a retried operation.
///
/// Structurally distinguishes success from the two ways of failing so callers
/// can log how a request ended without re-deriving it from the error kind.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// An attempt succeeded.
    Success { value: T, attempts: u32 },
    /// Every attempt failed transiently and the retry budget ran out.
    Exhausted { error: GatewayError, attempts: u32 },
    /// An attempt failed with a non-transient error; no further attempts were made.
    Rejected { error: GatewayError, attempts: u32 },
}

impl<T> RetryOutcome<T> {
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Rejected { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn into_result(self) -> Result<T, GatewayError> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Exhausted { error, .. } | Self::Rejected { error, .. } => Err(error),
        }
    }
}

/// Run `attempt` until it succeeds, fails non-transiently, or the retry budget
/// is spent.
///
/// `attempt` receives the retry count (0 for the initial attempt) so it can
/// stamp `X-Retry-Count`. Total attempts never exceed `1 + max_retries`.
pub async fn run_with_retry<T, F, Fut>(config: &RetryConfig, mut attempt: F) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut retry_count = 0;
    loop {
        let error = match attempt(retry_count).await {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: retry_count + 1,
                };
            }
            Err(error) => error,
        };

        if !error.kind.is_transient() {
            return RetryOutcome::Rejected {
                error,
                attempts: retry_count + 1,
            };
        }

        if retry_count >= config.max_retries {
            return RetryOutcome::Exhausted {
                error,
                attempts: retry_count + 1,
            };
        }

        retry_count += 1;
        let delay = backoff_delay(retry_count, config);
        tracing::debug!(
            kind = %error.kind,
            retry_count,
            delay_ms = delay.as_millis(),
            "Retrying request after transient error"
        );
        tokio::time::sleep(delay).await;
    }
}
