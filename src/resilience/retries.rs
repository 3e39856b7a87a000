//! Retry logic for store operations.
//!
//! # Responsibilities
//! - Run one store operation with bounded retries (`1 + max_retries` calls)
//! - Sleep with exponential backoff between attempts
//! - Report exhaustion as [`Outcome::Exhausted`], or as the last error in raise mode
//!
//! # Design Decisions
//! - Non-transient errors (bad key, auth, type) are never retried
//! - A successful `0` and an exhausted retry loop are different variants
//! - One warning per retry, one error on exhaustion

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::store::StoreError;

/// Result of a store operation run under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    /// The operation completed and returned a value.
    Success(T),
    /// Every attempt failed with a transient error.
    Exhausted {
        attempts: u32,
        last_error: StoreError,
    },
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The value, if the operation succeeded.
    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Exhausted { .. } => None,
        }
    }

    /// Convert into a `Result`, surfacing the last error on exhaustion.
    pub fn into_result(self) -> Result<T, StoreError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base_ms: u64,
    backoff_multiplier: f64,
    max_delay_ms: u64,
    jitter_ratio: f64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
            backoff_multiplier: config.backoff_multiplier,
            max_delay_ms: config.max_delay_ms,
            jitter_ratio: config.jitter_ratio,
        }
    }

    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self::new(&RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay slept after failed attempt number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.backoff_base_ms,
            self.backoff_multiplier,
            self.max_delay_ms,
            self.jitter_ratio,
        )
    }

    /// Run `f`, retrying transient failures.
    ///
    /// Returns `Err` only for a non-transient error, which is never retried.
    pub async fn run<T, F, Fut>(&self, op: &'static str, key: &str, mut f: F) -> Result<Outcome<T>, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(op, key, attempts = attempt + 1, "Store operation recovered");
                    }
                    return Ok(Outcome::Success(value));
                }
                Err(e) if !e.is_transient() => {
                    tracing::error!(op, key, error = %e, "Store operation failed, not retryable");
                    return Err(e);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        tracing::error!(
                            op,
                            key,
                            attempts = attempt + 1,
                            error = %e,
                            "Store operation failed, retries exhausted"
                        );
                        metrics::record_store_exhausted(op);
                        return Ok(Outcome::Exhausted {
                            attempts: attempt + 1,
                            last_error: e,
                        });
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        op,
                        key,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Store operation failed, retrying"
                    );
                    metrics::record_store_retry(op);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run `f`, retrying transient failures, and return the last error on exhaustion.
    pub async fn run_or_raise<T, F, Fut>(&self, op: &'static str, key: &str, f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.run(op, key, f).await?.into_result()
    }

    /// Run `f` in either mode.
    ///
    /// With `raise_on_failure` set, exhaustion is reported as `Err(last_error)`
    /// and the `Ok` value is always [`Outcome::Success`].
    pub async fn execute<T, F, Fut>(
        &self,
        op: &'static str,
        key: &str,
        raise_on_failure: bool,
        f: F,
    ) -> Result<Outcome<T>, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if raise_on_failure {
            self.run_or_raise(op, key, f).await.map(Outcome::Success)
        } else {
            self.run(op, key, f).await
        }
    }
}
