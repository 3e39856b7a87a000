//! Admission subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarded request (immediate or streamed):
//!     → policy.rs   (read count, reject at or above threshold, fail open)
//!     → guard.rs    (increment on entry, remember if it really happened)
//!     → [upstream work runs]
//!     → guard.rs    (decrement only if acquired; also on cancel and panic)
//!     → stream.rs   (same guard, released at end-of-stream or disconnect)
//! ```
//!
//! # Design Decisions
//! - One guard type serves both response paths
//! - Acquisition failure never blocks the request; the counter is a QoS signal
//! - The count is never decremented for an increment that was not confirmed

pub mod guard;
pub mod policy;
pub mod stream;

use std::future::Future;

use thiserror::Error;

use crate::config::QosConfig;
use crate::counter::{CounterKey, InflightCounter};
use crate::store::StoreError;

pub use guard::{guarded, AdmissionGuard, AdmissionState};
pub use policy::{Decision, QosPolicy};
pub use stream::GuardedStream;

/// Reasons the gate refuses to forward a request.
#[derive(Debug, Error)]
pub enum GateError {
    /// Provider is at or above its inflight threshold.
    #[error("provider {provider} saturated: {current} inflight, threshold {threshold}")]
    Rejected {
        provider: String,
        current: i64,
        threshold: i64,
    },

    /// Provider id cannot form a counter key.
    #[error("invalid provider: {0}")]
    InvalidProvider(#[from] StoreError),
}

/// Outcome of [`InflightGate::try_admit`].
#[derive(Debug)]
pub enum Admission {
    Admitted(AdmissionGuard),
    Rejected(Decision),
}

/// Admission control for forwarded requests.
#[derive(Debug, Clone)]
pub struct InflightGate {
    counter: InflightCounter,
    policy: QosPolicy,
}

impl InflightGate {
    pub fn new(counter: InflightCounter, qos: QosConfig) -> Self {
        let policy = QosPolicy::new(counter.clone(), qos);
        Self { counter, policy }
    }

    pub fn counter(&self) -> &InflightCounter {
        &self.counter
    }

    pub fn policy(&self) -> &QosPolicy {
        &self.policy
    }

    pub fn key_for(&self, provider: &str) -> Result<CounterKey, StoreError> {
        self.counter.key_for(provider)
    }

    /// Check `provider` against its configured threshold.
    pub async fn should_admit(&self, provider: &str) -> Result<bool, StoreError> {
        let key = self.key_for(provider)?;
        Ok(self
            .policy
            .should_admit(&key, self.policy.threshold_for(provider))
            .await)
    }

    /// Check the threshold, then take a slot if admitted.
    pub async fn try_admit(&self, provider: &str) -> Result<Admission, StoreError> {
        let key = self.key_for(provider)?;
        let decision = self
            .policy
            .evaluate(&key, self.policy.threshold_for(provider))
            .await;
        if !decision.admitted {
            return Ok(Admission::Rejected(decision));
        }
        Ok(Admission::Admitted(
            AdmissionGuard::acquire(&self.counter, key).await,
        ))
    }

    async fn admit(&self, provider: &str) -> Result<AdmissionGuard, GateError> {
        match self.try_admit(provider).await? {
            Admission::Admitted(guard) => Ok(guard),
            Admission::Rejected(decision) => Err(GateError::Rejected {
                provider: provider.to_string(),
                current: decision.current.unwrap_or_default(),
                threshold: decision.threshold,
            }),
        }
    }

    /// Forward an immediate-response request under admission control.
    pub async fn forward<F>(&self, provider: &str, work: F) -> Result<F::Output, GateError>
    where
        F: Future,
    {
        let guard = self.admit(provider).await?;
        let output = work.await;
        guard.release().await;
        Ok(output)
    }

    /// Forward a streamed response under admission control.
    ///
    /// The slot is held until the returned stream ends or is dropped.
    pub async fn forward_stream<S>(&self, provider: &str, stream: S) -> Result<GuardedStream<S>, GateError> {
        let guard = self.admit(provider).await?;
        Ok(GuardedStream::new(stream, guard))
    }
}
