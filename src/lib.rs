//! Inflight admission counter for an LLM gateway.
//!
//! Tracks the number of requests in flight to each upstream provider in a
//! shared Redis counter and uses it as a QoS admission signal.

pub mod config;
pub mod store;
pub mod resilience;
pub mod counter;
pub mod admission;
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use admission::{AdmissionGuard, AdmissionState, InflightGate};
pub use config::schema::GateConfig;
pub use counter::{CounterKey, InflightCounter};
pub use lifecycle::Shutdown;
pub use resilience::{Outcome, RetryPolicy};
pub use store::{CounterStore, StoreError};
