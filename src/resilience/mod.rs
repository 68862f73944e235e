//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a collaborator:
//!     → timeouts.rs (enforce per-call deadline)
//!     → On failure: retries.rs (check if retryable, retry with backoff)
//!     → backoff.rs (exponential delay with jitter)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - A timeout degrades only that call's contribution, never the run
//! - Only transport errors, 5xx and 429 are retried

pub mod backoff;
pub mod retries;
pub mod timeouts;
