//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect the counter store
//! - Assemble counter, policy, and gate from validated configuration
//! - Apply hot-reloaded QoS thresholds
//!
//! # Design Decisions
//! - Fail fast: an unreachable store at startup is fatal
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::admission::InflightGate;
use crate::config::validation::validate_qos;
use crate::config::{GateConfig, QosConfig};
use crate::counter::InflightCounter;
use crate::store::{CounterStore, RedisStore, StoreError};

/// Build the gate over an already connected store.
pub fn build_gate(config: &GateConfig, store: Arc<dyn CounterStore>) -> InflightGate {
    let counter = InflightCounter::new(store, &config.retries, &config.counter);
    InflightGate::new(counter, config.qos.clone())
}

/// Connect to Redis and build the gate.
pub async fn connect_gate(config: &GateConfig) -> Result<InflightGate, StoreError> {
    let store = RedisStore::connect(&config.store).await?;
    Ok(build_gate(config, Arc::new(store)))
}

/// Apply QoS sections from reloaded configs until shutdown.
pub async fn apply_reloads(
    gate: InflightGate,
    mut updates: mpsc::UnboundedReceiver<QosConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(qos) = update else { break };
                let errors = validate_qos(&qos);
                if !errors.is_empty() {
                    tracing::error!(errors = ?errors, "Ignoring invalid QoS reload");
                    continue;
                }
                if *gate.policy().thresholds() != qos {
                    gate.policy().update(qos);
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Config reload task stopped");
}
