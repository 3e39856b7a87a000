//! Scoped inflight acquisition.
//!
//! # State Transitions
//! ```text
//! acquire():  increment Ok  → Acquired
//!             increment Err → AcquireFailed   (fail open, work still runs)
//! release() / drop:
//!             Acquired      → Released        (exactly one decrement)
//!             AcquireFailed → Skipped         (store never touched)
//! ```
//!
//! There is no path from `AcquireFailed` to a decrement. A guard dropped
//! while still `Acquired` (cancellation, panic, forgotten release) spawns its
//! decrement on the current runtime.

use std::future::Future;

use serde::Serialize;

use crate::counter::{CounterKey, InflightCounter};
use crate::observability::metrics;

/// Admission token: whether this request's increment really happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    /// The store confirmed our increment; a decrement is owed.
    Acquired,
    /// The increment failed or is of unknown effect; nothing is owed.
    AcquireFailed,
    /// The owed decrement was issued.
    Released,
    /// Exit from `AcquireFailed`; no decrement was issued.
    Skipped,
}

/// Holds one request's share of a provider's inflight count.
#[derive(Debug)]
#[must_use = "dropping the guard releases the inflight slot immediately"]
pub struct AdmissionGuard {
    counter: InflightCounter,
    key: CounterKey,
    state: AdmissionState,
}

impl AdmissionGuard {
    /// Increment `key` and record whether it succeeded.
    pub async fn acquire(counter: &InflightCounter, key: CounterKey) -> Self {
        let state = match counter.increment(&key).await {
            Ok(value) => {
                tracing::debug!(key = %key, value, "Inflight slot acquired");
                metrics::record_acquire("acquired");
                AdmissionState::Acquired
            }
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    error = %e,
                    "Inflight increment failed, admitting without a slot"
                );
                metrics::record_acquire("failed");
                AdmissionState::AcquireFailed
            }
        };

        Self {
            counter: counter.clone(),
            key,
            state,
        }
    }

    pub fn state(&self) -> AdmissionState {
        self.state
    }

    pub fn is_acquired(&self) -> bool {
        self.state == AdmissionState::Acquired
    }

    pub fn key(&self) -> &CounterKey {
        &self.key
    }

    /// Leave the guarded scope, decrementing only if the slot was acquired.
    ///
    /// Never fails: a lost decrement is logged and left to the key's TTL.
    pub async fn release(mut self) -> AdmissionState {
        match self.state {
            AdmissionState::Acquired => {
                // Marked before awaiting so a cancelled release cannot decrement twice.
                self.state = AdmissionState::Released;
                let _ = self.counter.decrement(&self.key).await;
                metrics::record_release("released");
            }
            AdmissionState::AcquireFailed => {
                self.state = AdmissionState::Skipped;
                tracing::debug!(key = %self.key, "No inflight slot held, skipping decrement");
                metrics::record_release("skipped");
            }
            AdmissionState::Released | AdmissionState::Skipped => {}
        }
        self.state
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        match self.state {
            AdmissionState::Acquired => {
                self.state = AdmissionState::Released;
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        let counter = self.counter.clone();
                        let key = self.key.clone();
                        tracing::debug!(key = %key, "Inflight guard dropped, releasing in background");
                        handle.spawn(async move {
                            let _ = counter.decrement(&key).await;
                        });
                        metrics::record_release("released_on_drop");
                    }
                    Err(_) => {
                        tracing::error!(
                            key = %self.key,
                            "Inflight guard dropped outside a runtime, TTL will reclaim the slot"
                        );
                        metrics::record_release("leaked");
                    }
                }
            }
            AdmissionState::AcquireFailed => {
                self.state = AdmissionState::Skipped;
                metrics::record_release("skipped");
            }
            AdmissionState::Released | AdmissionState::Skipped => {}
        }
    }
}

/// Run `work` while holding an inflight slot for `key`.
///
/// The work runs whether or not the slot was acquired, and its output is
/// returned untouched. If the returned future is dropped early the guard's
/// `Drop` performs the release.
pub async fn guarded<F>(counter: &InflightCounter, key: CounterKey, work: F) -> F::Output
where
    F: Future,
{
    let guard = AdmissionGuard::acquire(counter, key).await;
    let output = work.await;
    guard.release().await;
    output
}
