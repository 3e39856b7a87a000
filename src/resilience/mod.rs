//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Store operation (INCR / DECR / EXPIRE):
//!     → retries.rs (classify error, retry transient failures)
//!     → backoff.rs (exponential delay between attempts)
//!     → Outcome: Success(value) | Exhausted { attempts, last_error }
//! ```
//!
//! # Design Decisions
//! - Only transient store errors are retried; everything else propagates at once
//! - Exhaustion is a distinct outcome, never a falsy value
//! - Backoff is deterministic unless jitter is configured

pub mod backoff;
pub mod retries;

pub use retries::{Outcome, RetryPolicy};
