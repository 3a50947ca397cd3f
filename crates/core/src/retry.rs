// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry with exponential backoff.
//!
//! A single `retry` primitive driven by an explicit [`RetryPolicy`] record.
//! Callers decide which errors are worth retrying; the policy owns the
//! attempt budget and delay curve.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Compute the delay before the next attempt, in milliseconds.
///
/// `floor(min(base * multiplier^attempt, max) * (1 + jitter))` with
/// `jitter ∈ [-0.2, +0.2]`. `attempt` is zero-based: attempt 0 sleeps
/// roughly `base_ms`.
pub fn calculate_backoff_delay(attempt: u32, base_ms: u64, max_ms: u64, multiplier: f64) -> u64 {
    let exp = (base_ms as f64) * multiplier.powi(attempt as i32);
    let capped = exp.min(max_ms as f64);
    let jitter = rand::thread_rng().gen_range(-0.2..=0.2);
    (capped * (1.0 + jitter)).floor().max(0.0) as u64
}

/// Retry configuration passed to [`retry`].
pub struct RetryPolicy<E> {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Errors for which another attempt is worthwhile. Non-retryable
    /// errors surface immediately.
    pub is_retryable: Box<dyn Fn(&E) -> bool + Send + Sync>,
    /// Observer invoked before each sleep with (attempt, error).
    pub on_retry: Option<Box<dyn Fn(u32, &E) + Send + Sync>>,
}

impl<E> RetryPolicy<E> {
    /// Policy that retries every error.
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            multiplier: 2.0,
            is_retryable: Box::new(|_| true),
            on_retry: None,
        }
    }

    /// Replace the retryability predicate.
    pub fn retryable_when(mut self, pred: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.is_retryable = Box::new(pred);
        self
    }

    /// Install a retry observer.
    pub fn on_retry(mut self, cb: impl Fn(u32, &E) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(cb));
        self
    }
}

/// Run `op` until it succeeds, the policy's attempt budget is exhausted,
/// or a non-retryable error occurs. The **last** error is surfaced on
/// exhaustion.
pub async fn retry<T, E, Fut>(
    policy: &RetryPolicy<E>,
    mut op: impl FnMut() -> Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts || !(policy.is_retryable)(&err) {
                    return Err(err);
                }
                if let Some(cb) = &policy.on_retry {
                    cb(attempt, &err);
                }
                let delay = calculate_backoff_delay(
                    attempt - 1,
                    policy.base_delay_ms,
                    policy.max_delay_ms,
                    policy.multiplier,
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
