//! Correlation subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceAggregator (aggregator.rs)
//!     → ranking search, candidate selection
//!     → per service:
//!         FailureLocator (locator.rs)   path → newest K failure times
//!         WindowCorrelator (correlator.rs)
//!             → WindowIndex (window.rs) [t, t + Δ] per failure time
//!             → one diagnostics search, first containing window wins
//!     → Vec<ServiceReport>, descending error_count
//! ```

pub mod aggregator;
pub mod correlator;
pub mod locator;
pub mod types;
pub mod window;

pub use aggregator::{AggregatorSettings, Collaborators, ServiceAggregator};
pub use correlator::{CorrelationLimits, WindowCorrelator};
pub use locator::FailureLocator;
pub use types::{
    failure_rate_pct, CorrelatedMessages, LocatedFailures, PathFailures, PathMessage, PathReport, RankedService,
    ServiceReport, UNKNOWN_PROGRAM,
};
pub use window::{CorrelationWindow, WindowIndex};
