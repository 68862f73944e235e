//! Persisted snapshot documents and the derived weekly rollup.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::correlate::types::ServiceReport;
use crate::sources::TicketRef;
use crate::time::{TimeRange, Timestamp};

/// One ranking line of a daily report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub service_id: String,
    pub program_name: String,
    pub error_count: u64,
    pub ticket: Option<TicketRef>,
}

impl From<&ServiceReport> for SummaryRow {
    fn from(report: &ServiceReport) -> Self {
        Self {
            service_id: report.service_id.clone(),
            program_name: report.program_name.clone(),
            error_count: report.error_count,
            ticket: report.ticket.clone(),
        }
    }
}

/// A full day's aggregation. Replaced wholesale on re-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub earliest: Timestamp,
    pub latest: Timestamp,
    pub generated_at: DateTime<Utc>,
    /// Descending error_count.
    pub services: Vec<ServiceReport>,
    pub summary: Vec<SummaryRow>,
}

impl DailySnapshot {
    /// Keyed by the calendar date of `range.earliest`.
    pub fn new(range: TimeRange, services: Vec<ServiceReport>, generated_at: DateTime<Utc>) -> Self {
        let summary = services.iter().map(SummaryRow::from).collect();
        Self {
            date: range.earliest.date(),
            earliest: range.earliest,
            latest: range.latest,
            generated_at,
            services,
            summary,
        }
    }
}

/// Snapshots for one Saturday–Friday week merged per service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRollup {
    /// Saturday.
    pub start: NaiveDate,
    /// Friday.
    pub end: NaiveDate,
    pub services: Vec<ServiceReport>,
    /// Contributing dates, ascending.
    pub dates: Vec<NaiveDate>,
    pub days_present: usize,
}

/// Result of a week lookup. An empty week is data, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum WeekLookup {
    Merged(WeeklyRollup),
    NoData { start: NaiveDate, end: NaiveDate },
}
