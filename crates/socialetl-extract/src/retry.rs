//! Retry with exponential back-off and jitter for extractor network steps.
//!
//! [`retry_with_backoff`] retries only errors for which
//! [`ExtractError::is_transient`] holds. Quota, auth and target errors are
//! returned on the first failure. When retries run out the last error is
//! wrapped in [`ExtractError::Exhausted`].

use std::future::Future;
use std::time::Duration;

use crate::error::ExtractError;

const MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
        }
    }

    /// Delay before retry number `attempt` (1-based), before jitter.
    ///
    /// `backoff_base_ms × 2^(attempt-1)`, raised to any server-requested
    /// `Retry-After`, capped at 60 s.
    fn base_delay_ms(&self, attempt: u32, err: &ExtractError) -> u64 {
        let computed = self
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
        let requested = match err {
            ExtractError::RateLimited {
                retry_after_secs, ..
            } => retry_after_secs.saturating_mul(1000),
            _ => 0,
        };
        computed.max(requested).min(MAX_DELAY_MS)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1000)
    }
}

/// Runs `operation` with up to `policy.max_retries` additional attempts on
/// transient errors.
///
/// Back-off schedule with `backoff_base_ms = 1_000`:
///
/// | Attempt | Sleep before next attempt        |
/// |---------|----------------------------------|
/// | 1       | 1 000 ms × 2⁰ ± 25 % jitter     |
/// | 2       | 1 000 ms × 2¹ ± 25 % jitter     |
/// | 3       | 1 000 ms × 2² ± 25 % jitter     |
///
/// # Errors
///
/// Non-transient errors are returned unchanged. A transient error that
/// survives every retry comes back as [`ExtractError::Exhausted`].
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    context: &str,
    mut operation: F,
) -> Result<T, ExtractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExtractError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }
                if attempt >= policy.max_retries {
                    return Err(ExtractError::Exhausted {
                        context: context.to_string(),
                        attempts: attempt + 1,
                        last: Box::new(err),
                    });
                }
                attempt += 1;
                let capped = policy.base_delay_ms(attempt, &err);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    context,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms,
                    error = %err,
                    "transient extraction error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
