//! Snapshot cache subsystem.
//!
//! # Data Flow
//! ```text
//! ReportService::refresh
//!     → RollupCache::write (rollup.rs)
//!         → KvStore::put("snapshot-YYYY-MM-DD")   (store.rs: FsStore | MemoryStore)
//!         → KvStore::put("latest")
//!         → local read-through copy (DashMap)
//!
//! ReportService::get / get_week / list_dates
//!     → RollupCache::read / merge_week / list_dates
//!         → local copy, else KvStore::get
//! ```
//!
//! # Design Decisions
//! - The store is the single authority; the DashMap only mirrors it
//! - Filesystem writes go to a temp file and are renamed into place
//! - Weekly rollups are derived on demand and never persisted

pub mod rollup;
pub mod store;
pub mod types;

pub use rollup::{CacheError, MergeCaps, RollupCache};
pub use store::{FsStore, KvStore, MemoryStore, StoreError};
pub use types::{DailySnapshot, SummaryRow, WeekLookup, WeeklyRollup};
