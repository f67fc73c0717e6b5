//! Retry policy for map-data requests.
//!
//! Each attempt goes to a different endpoint (round-robin by attempt index),
//! runs under a hard timeout, and failed attempts wait before the next one:
//! a fixed delay for timeouts and error statuses, a linearly growing backoff
//! for 429s. No wait follows the final attempt.

use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use ekimae_shared::{EkimaeError, Result, RetrySettings};

use crate::transport::MapTransport;

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The attempt hit the per-attempt deadline.
    Timeout,
    /// HTTP 429.
    RateLimited,
    /// Any other non-2xx status.
    Status(u16),
    /// Connection or body-read failure.
    Transport(String),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out"),
            Self::RateLimited => f.write_str("HTTP 429"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::Transport(msg) => f.write_str(msg),
        }
    }
}

/// Attempt budget, endpoint rotation and backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    endpoints: Vec<Url>,
    max_attempts: u32,
    attempt_timeout: Duration,
    retry_delay: Duration,
    rate_limit_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(
        endpoints: Vec<Url>,
        max_attempts: u32,
        attempt_timeout: Duration,
        retry_delay: Duration,
        rate_limit_backoff: Duration,
    ) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(EkimaeError::config("retry policy needs at least one endpoint"));
        }
        if max_attempts == 0 {
            return Err(EkimaeError::config("retry policy needs at least one attempt"));
        }
        Ok(Self {
            endpoints,
            max_attempts,
            attempt_timeout,
            retry_delay,
            rate_limit_backoff,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Endpoint for a 1-based attempt number.
    pub fn endpoint_for(&self, attempt: u32) -> &Url {
        let index = (attempt.saturating_sub(1) as usize) % self.endpoints.len();
        &self.endpoints[index]
    }

    /// Wait after a failed 1-based attempt.
    pub fn backoff(&self, kind: &FailureKind, attempt: u32) -> Duration {
        match kind {
            FailureKind::RateLimited => self.rate_limit_backoff * attempt,
            _ => self.retry_delay,
        }
    }
}

impl TryFrom<&RetrySettings> for RetryPolicy {
    type Error = EkimaeError;

    fn try_from(settings: &RetrySettings) -> Result<Self> {
        Self::new(
            settings.endpoints.clone(),
            settings.max_attempts,
            settings.request_timeout,
            settings.retry_delay,
            settings.rate_limit_backoff,
        )
    }
}

/// POST `query` following `policy` and return the first 2xx body.
///
/// Exhausting the attempt budget yields [`EkimaeError::RetriesExhausted`].
pub async fn execute_with_retry<T: MapTransport>(
    policy: &RetryPolicy,
    transport: &T,
    query: &str,
    label: &str,
) -> Result<String> {
    let mut last_failure = FailureKind::Timeout;

    for attempt in 1..=policy.max_attempts {
        let endpoint = policy.endpoint_for(attempt);
        debug!(label, attempt, %endpoint, "map-data attempt");

        let outcome = tokio::time::timeout(policy.attempt_timeout, transport.post(endpoint, query)).await;

        let failure = match outcome {
            Ok(Ok(response)) if response.is_success() => return Ok(response.body),
            Ok(Ok(response)) if response.is_rate_limited() => FailureKind::RateLimited,
            Ok(Ok(response)) => FailureKind::Status(response.status),
            Ok(Err(e)) => FailureKind::Transport(e.to_string()),
            Err(_) => FailureKind::Timeout,
        };

        warn!(
            label,
            attempt,
            max_attempts = policy.max_attempts,
            %endpoint,
            reason = %failure,
            "map-data attempt failed"
        );

        if attempt < policy.max_attempts {
            let wait = policy.backoff(&failure, attempt);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
        last_failure = failure;
    }

    Err(EkimaeError::RetriesExhausted {
        attempts: policy.max_attempts,
        last_error: last_failure.to_string(),
    })
}
