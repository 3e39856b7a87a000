//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, INFLIGHT_* env overrides)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → QoS thresholds swapped atomically (arc-swap)
//! ```
//!
//! # Design Decisions
//! - Only QoS thresholds are hot-reloaded; store and counter settings need a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::GateConfig;
pub use schema::StoreConfig;
pub use schema::RetryConfig;
pub use schema::CounterConfig;
pub use schema::QosConfig;
pub use schema::ObservabilityConfig;
pub use schema::AdminConfig;
pub use schema::LogFormat;
