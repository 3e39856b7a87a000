//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every retry, exhausted operation, and skipped release is logged with its key
//! - Metrics are cheap (atomic increments) and safe to call without an exporter

pub mod logging;
pub mod metrics;
