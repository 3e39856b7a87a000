//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Connect store → Build gate → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Admin API drains → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then store, then listeners
//! - Inflight slots still held at exit are reclaimed by their TTL

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
