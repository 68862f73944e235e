//! Report API exposed to the host.
//!
//! # Data Flow
//! ```text
//! refresh(earliest?, latest?, services?)
//!     → resolve range (default: previous UTC day)
//!     → ServiceAggregator::aggregate
//!     → DailySnapshot → RollupCache::write
//!
//! get(date?) / get_week(friday?) / list_dates()  → RollupCache
//! daily_stats(days)                               → EventStore (daily counts)
//! ```

pub mod service;
pub mod stats;

pub use service::{resolve_friday, resolve_range, RefreshRequest, ReportError, ReportService};
pub use stats::DailyStat;
