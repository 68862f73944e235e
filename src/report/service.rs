//! ReportService: the API the host (HTTP layer, CLI) talks to.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeDelta, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::cache::{CacheError, DailySnapshot, KvStore, MergeCaps, RollupCache, WeekLookup};
use crate::config::ReportConfig;
use crate::correlate::aggregator::{AggregatorSettings, Collaborators, ServiceAggregator};
use crate::report::stats::{effective_days, parse_daily_stats, DailyStat};
use crate::resilience::timeouts::with_deadline;
use crate::sources::query::QueryShapes;
use crate::sources::{EventStore, IssueTracker, TicketRef};
use crate::time::{last_friday_on_or_before, today_utc, week_ending_friday, TimeRange, Timestamp};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    NotFound(CacheError),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error(transparent)]
    Cache(CacheError),
}

impl From<CacheError> for ReportError {
    fn from(e: CacheError) -> Self {
        if e.is_not_found() {
            ReportError::NotFound(e)
        } else {
            ReportError::Cache(e)
        }
    }
}

/// Inputs to a refresh. Bounds are given together or not at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshRequest {
    pub earliest: Option<Timestamp>,
    pub latest: Option<Timestamp>,
    pub services: Option<Vec<String>>,
}

/// The explicit range, or the previous UTC day when no bounds are given.
pub fn resolve_range(earliest: Option<Timestamp>, latest: Option<Timestamp>, today: NaiveDate) -> Result<TimeRange, ReportError> {
    match (earliest, latest) {
        (Some(earliest), Some(latest)) => TimeRange::new(earliest, latest)
            .ok_or_else(|| ReportError::InvalidRange(format!("earliest {} is not before latest {}", earliest, latest))),
        (None, None) => {
            let yesterday = today
                .pred_opt()
                .ok_or_else(|| ReportError::InvalidRange(format!("no day before {}", today)))?;
            Ok(TimeRange::day(yesterday))
        }
        _ => Err(ReportError::InvalidRange(
            "earliest and latest must be given together".to_string(),
        )),
    }
}

/// The Friday closing the requested week, or the last Friday up to `today`.
pub fn resolve_friday(date: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    match date {
        Some(date) => week_ending_friday(date),
        None => last_friday_on_or_before(today),
    }
}

#[derive(Clone)]
pub struct ReportService {
    aggregator: ServiceAggregator,
    cache: RollupCache,
    store: Arc<dyn EventStore>,
    tracker: Arc<dyn IssueTracker>,
    shapes: QueryShapes,
    query_deadline: Duration,
}

impl ReportService {
    pub fn new(
        aggregator: ServiceAggregator,
        cache: RollupCache,
        store: Arc<dyn EventStore>,
        tracker: Arc<dyn IssueTracker>,
        shapes: QueryShapes,
        query_deadline: Duration,
    ) -> Self {
        Self {
            aggregator,
            cache,
            store,
            tracker,
            shapes,
            query_deadline,
        }
    }

    /// Wire the aggregator and cache from configuration.
    pub fn from_config(config: &ReportConfig, collaborators: Collaborators, kv: Arc<dyn KvStore>) -> Self {
        let shapes = QueryShapes::new(config.event_store.clone());
        let settings = AggregatorSettings::from(config);
        let caps = MergeCaps {
            failure_times: settings.failure_cap,
            messages: settings.limits.message_cap,
        };
        let store = collaborators.store.clone();
        let tracker = collaborators.tracker.clone();

        Self::new(
            ServiceAggregator::new(collaborators, shapes.clone(), settings),
            RollupCache::new(kv, caps, config.cache.read_through),
            store,
            tracker,
            shapes,
            Duration::from_secs(config.timeouts.query_secs),
        )
    }

    pub fn cache(&self) -> &RollupCache {
        &self.cache
    }

    /// Aggregate the range and persist it as the snapshot for `earliest`'s date.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<DailySnapshot, ReportError> {
        let range = resolve_range(request.earliest, request.latest, today_utc())?;
        let services = request
            .services
            .map(|ids| ids.into_iter().map(|id| id.trim().to_string()).filter(|id| !id.is_empty()).collect::<Vec<_>>())
            .filter(|ids| !ids.is_empty());

        tracing::info!(earliest = %range.earliest, latest = %range.latest, explicit = services.is_some(), "Refreshing report");

        let reports = self.aggregator.aggregate(range, services.as_deref()).await;
        let snapshot = DailySnapshot::new(range, reports, Utc::now());
        self.cache.write(&snapshot)?;
        Ok(snapshot)
    }

    pub fn get(&self, date: Option<NaiveDate>) -> Result<Arc<DailySnapshot>, ReportError> {
        Ok(self.cache.read(date)?)
    }

    pub fn get_week(&self, date: Option<NaiveDate>) -> Result<WeekLookup, ReportError> {
        let friday = resolve_friday(date, today_utc());
        Ok(self.cache.merge_week(friday)?)
    }

    pub fn list_dates(&self) -> Result<Vec<NaiveDate>, ReportError> {
        Ok(self.cache.list_dates()?)
    }

    /// The open ticket referencing `service_id`, if the tracker finds one.
    ///
    /// Tracker failures read as "no ticket".
    pub async fn find_ticket(&self, service_id: &str) -> Option<TicketRef> {
        match with_deadline(self.query_deadline, self.tracker.search_by_service_id(service_id)).await {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!(service = service_id, error = %e, "Ticket lookup failed");
                None
            }
        }
    }

    /// Per-day totals for the last `days` days (60 when not positive).
    ///
    /// Never fails: a store error or an out-of-calendar span yields an empty list.
    pub async fn daily_stats(&self, days: i64) -> Vec<DailyStat> {
        let days = effective_days(days);
        let Some(first) = TimeDelta::try_days(days).and_then(|span| today_utc().checked_sub_signed(span)) else {
            tracing::warn!(days, "Daily statistics span is out of range");
            return Vec::new();
        };
        let Some(range) = TimeRange::new(Timestamp::start_of(first), Timestamp::now()) else {
            return Vec::new();
        };

        let query = self.shapes.daily_counts(range);
        match with_deadline(self.query_deadline, self.store.query(&query)).await {
            Ok(rows) => parse_daily_stats(&rows),
            Err(e) => {
                tracing::warn!(days, error = %e, "Daily statistics search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse(raw).unwrap()
    }

    #[test]
    fn test_default_range_is_previous_day() {
        let range = resolve_range(None, None, date("2025-06-19")).unwrap();
        assert_eq!(range.earliest, ts("2025-06-18 00:00:00"));
        assert_eq!(range.latest, ts("2025-06-19 00:00:00"));
    }

    #[test]
    fn test_explicit_range_is_validated() {
        let ok = resolve_range(Some(ts("2025-06-18 06:00:00")), Some(ts("2025-06-18 18:00:00")), date("2025-06-19"));
        assert!(ok.is_ok());

        let inverted = resolve_range(Some(ts("2025-06-18 18:00:00")), Some(ts("2025-06-18 06:00:00")), date("2025-06-19"));
        assert!(matches!(inverted, Err(ReportError::InvalidRange(_))));

        let half = resolve_range(Some(ts("2025-06-18 06:00:00")), None, date("2025-06-19"));
        assert!(matches!(half, Err(ReportError::InvalidRange(_))));
    }

    #[test]
    fn test_resolve_friday() {
        // Wednesday → the Friday of its week; no date → last Friday.
        assert_eq!(resolve_friday(Some(date("2025-06-18")), date("2025-07-01")), date("2025-06-20"));
        assert_eq!(resolve_friday(None, date("2025-06-18")), date("2025-06-13"));
        assert_eq!(resolve_friday(None, date("2025-06-20")), date("2025-06-20"));
    }

    #[test]
    fn test_cache_miss_maps_to_not_found() {
        let err: ReportError = CacheError::NotFound(date("2025-06-18")).into();
        assert!(matches!(err, ReportError::NotFound(_)));
    }
}
