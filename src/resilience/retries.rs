//! Retry logic for collaborator HTTP calls.
//!
//! # Responsibilities
//! - Determine if a failed call is retryable
//! - Execute retries with exponential backoff + jitter
//!
//! # Design Decisions
//! - All collaborator calls are reads, so any transport error is retryable
//! - 5xx and 429 are retried; other statuses fail immediately
//! - Attempts are bounded by `RetryConfig::max_attempts`

use std::future::Future;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;
use crate::sources::SourceError;

/// Whether an error is worth another attempt.
pub fn is_retryable(error: &SourceError) -> bool {
    match error {
        SourceError::Unreachable(_) | SourceError::Timeout(_) => true,
        SourceError::Status { status, .. } => *status >= 500 || *status == 429,
        SourceError::Decode(_) | SourceError::MissingSid => false,
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs out of attempts.
pub async fn retry<T, F, Fut>(config: &RetryConfig, label: &str, mut op: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = if config.enabled { config.max_attempts.max(1) } else { 1 };
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms);
                tracing::info!(call = label, attempt, delay = ?delay, error = %e, "Retrying collaborator call");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
