//! QoS admission policy over inflight counts.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::config::QosConfig;
use crate::counter::{CounterKey, InflightCounter};
use crate::observability::metrics;

/// Result of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub admitted: bool,
    /// Count that was read, `None` if the read failed.
    pub current: Option<i64>,
    pub threshold: i64,
}

/// Rejects admission once a provider's inflight count reaches its threshold.
#[derive(Debug, Clone)]
pub struct QosPolicy {
    counter: InflightCounter,
    thresholds: Arc<ArcSwap<QosConfig>>,
}

impl QosPolicy {
    pub fn new(counter: InflightCounter, qos: QosConfig) -> Self {
        Self {
            counter,
            thresholds: Arc::new(ArcSwap::from_pointee(qos)),
        }
    }

    /// Replace the thresholds. In-flight checks keep the old snapshot.
    pub fn update(&self, qos: QosConfig) {
        tracing::info!(
            default_threshold = qos.default_threshold,
            overrides = qos.providers.len(),
            "QoS thresholds updated"
        );
        self.thresholds.store(Arc::new(qos));
    }

    pub fn thresholds(&self) -> Arc<QosConfig> {
        self.thresholds.load_full()
    }

    pub fn threshold_for(&self, provider: &str) -> i64 {
        self.thresholds.load().threshold_for(provider)
    }

    /// `true` unless `key`'s count is at or above `threshold`.
    ///
    /// A missing key counts as zero. A failed read admits.
    pub async fn should_admit(&self, key: &CounterKey, threshold: i64) -> bool {
        self.evaluate(key, threshold).await.admitted
    }

    /// Decision for an already-read count. Shared with the admin surface.
    pub fn decide(current: i64, threshold: i64) -> Decision {
        Decision {
            admitted: current < threshold,
            current: Some(current),
            threshold,
        }
    }

    pub async fn evaluate(&self, key: &CounterKey, threshold: i64) -> Decision {
        let decision = match self.counter.current(key).await {
            Ok(current) => Self::decide(current, threshold),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Inflight read failed, admitting");
                metrics::record_admission_read_failure();
                Decision {
                    admitted: true,
                    current: None,
                    threshold,
                }
            }
        };

        if !decision.admitted {
            tracing::info!(
                key = %key,
                current = ?decision.current,
                threshold,
                "Admission rejected, provider saturated"
            );
        }
        metrics::record_admission(key.provider(), decision.admitted);
        decision
    }
}
