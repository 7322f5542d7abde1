//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Client call:
//!     → timeouts.rs (per-call deadline, 504 on expiry)
//!     → On failure: retries.rs (check if retryable, retry with backoff)
//!     → backoff.rs (capped exponential delay + jitter)
//! ```
//!
//! # Design Decisions
//! - Retries wrap the whole attempt, timeout included
//! - One deduplicated call retries once for all joined callers

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{retry, RetryPolicy};
pub use timeouts::with_timeout;
