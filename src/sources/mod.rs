//! External collaborators: event store, issue tracker, submission totals.
//!
//! # Data Flow
//! ```text
//! correlate/ builds an EventQuery via query.rs (QueryShapes)
//!     → EventStore::query (search_client.rs over HTTP, or an in-memory fake)
//!     → Vec<Row> (field name → string value)
//!
//! IssueTracker::search_by_service_id   (tracker_client.rs)
//! SubmissionTotals::total_submissions  (totals.rs, backed by the event store)
//! ```
//!
//! # Design Decisions
//! - Traits sit at the collaborator seam so the core is testable without I/O
//! - Every error is a `SourceError`; callers decide the fallback value
//! - Rows stay stringly typed; parsing happens in the component that owns the field

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::TimeRange;

pub mod query;
pub mod search_client;
pub mod totals;
pub mod tracker_client;

pub use query::QueryShapes;
pub use search_client::SearchClient;
pub use totals::EventStoreTotals;
pub use tracker_client::TrackerClient;

/// One result row: field name → string value.
pub type Row = HashMap<String, String>;

/// Row field names produced by the query shapes.
pub mod fields {
    pub const SERVICE: &str = "service";
    pub const PROGRAM_NAME: &str = "program_name";
    pub const ERROR_COUNT: &str = "error_count";
    pub const PATH: &str = "path";
    pub const FAILURE_TIME: &str = "failure_time";
    pub const EVENT_TIME: &str = "event_time";
    pub const MESSAGE: &str = "msg";
    pub const TOTAL: &str = "total";
    pub const FAILED: &str = "failed";
    pub const DAY: &str = "day";
}

/// Logical query shape, used for fakes and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Failing services ranked by failure count, with program name.
    RankedServices,
    /// Failure timestamps grouped by path, ranked and capped.
    PathFailures,
    /// Diagnostic events with an event-time field and a message field.
    Diagnostics,
    /// Total submission volume for one service.
    SubmissionTotal,
    /// Per-day totals and failures.
    DailyCounts,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::RankedServices => "ranked_services",
            QueryKind::PathFailures => "path_failures",
            QueryKind::Diagnostics => "diagnostics",
            QueryKind::SubmissionTotal => "submission_total",
            QueryKind::DailyCounts => "daily_counts",
        }
    }
}

/// A filter expression plus the range it runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub kind: QueryKind,
    pub filter: String,
    pub range: TimeRange,
}

/// Errors raised by collaborators.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection refused, DNS failure, TLS failure...
    #[error("collaborator unreachable: {0}")]
    Unreachable(String),

    /// Non-success HTTP status.
    #[error("collaborator returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Call exceeded its deadline.
    #[error("collaborator call timed out after {0} seconds")]
    Timeout(u64),

    /// Response body did not have the expected shape.
    #[error("failed to decode collaborator response: {0}")]
    Decode(String),

    /// Search job accepted but no job id came back.
    #[error("search job started but no sid was returned")]
    MissingSid,
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Unreachable(e.to_string())
        }
    }
}

/// A best-effort ticket reference for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRef {
    pub key: String,
    pub url: String,
}

/// Event store: runs a filter over a range and returns ordered rows.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn query(&self, query: &EventQuery) -> Result<Vec<Row>, SourceError>;
}

/// Issue tracker: finds the open ticket tracking a service, if any.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn search_by_service_id(&self, service_id: &str) -> Result<Option<TicketRef>, SourceError>;
}

/// Submission volume per service.
#[async_trait]
pub trait SubmissionTotals: Send + Sync {
    async fn total_submissions(&self, service_id: &str, range: &TimeRange) -> Result<u64, SourceError>;
}

/// Tracker used when ticket lookups are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTracker;

#[async_trait]
impl IssueTracker for NoTracker {
    async fn search_by_service_id(&self, _service_id: &str) -> Result<Option<TicketRef>, SourceError> {
        Ok(None)
    }
}

/// Fetch a field, treating blank values as absent.
pub fn field<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}
