//! RollupCache: date-keyed snapshots over a [`KvStore`], plus weekly merges.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use dashmap::DashMap;
use thiserror::Error;

use crate::cache::store::{KvStore, StoreError};
use crate::cache::types::{DailySnapshot, WeekLookup, WeeklyRollup};
use crate::correlate::types::{failure_rate_pct, PathMessage, PathReport, ServiceReport, UNKNOWN_PROGRAM};
use crate::observability::metrics;
use crate::time::{today_utc, Timestamp};

const SNAPSHOT_PREFIX: &str = "snapshot-";
const LATEST_KEY: &str = "latest";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no snapshot stored for {0}")]
    NotFound(NaiveDate),

    #[error("no snapshot stored for today and no previous snapshot recorded")]
    NothingCached,

    #[error("snapshot store failed: {0}")]
    Store(#[from] StoreError),

    #[error("stored document '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_) | CacheError::NothingCached)
    }
}

/// Per-path caps applied when merging several days.
#[derive(Debug, Clone, Copy)]
pub struct MergeCaps {
    /// K.
    pub failure_times: usize,
    /// M.
    pub messages: usize,
}

/// Authoritative snapshots in a [`KvStore`], with an optional local copy.
#[derive(Clone)]
pub struct RollupCache {
    store: Arc<dyn KvStore>,
    local: Option<Arc<DashMap<NaiveDate, Arc<DailySnapshot>>>>,
    caps: MergeCaps,
}

fn snapshot_key(date: NaiveDate) -> String {
    format!("{SNAPSHOT_PREFIX}{}", date.format(DATE_FORMAT))
}

fn parse_snapshot_key(key: &str) -> Option<NaiveDate> {
    let raw = key.strip_prefix(SNAPSHOT_PREFIX)?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

impl RollupCache {
    pub fn new(store: Arc<dyn KvStore>, caps: MergeCaps, read_through: bool) -> Self {
        Self {
            store,
            local: read_through.then(|| Arc::new(DashMap::new())),
            caps,
        }
    }

    /// Replace the snapshot for its date and move the latest pointer to it.
    pub fn write(&self, snapshot: &DailySnapshot) -> Result<(), CacheError> {
        let body = serde_json::to_string_pretty(snapshot).map_err(CacheError::Encode)?;
        self.store.put(&snapshot_key(snapshot.date), &body)?;
        self.store.put(LATEST_KEY, &snapshot.date.format(DATE_FORMAT).to_string())?;

        if let Some(local) = &self.local {
            local.insert(snapshot.date, Arc::new(snapshot.clone()));
        }
        metrics::record_snapshot_write();
        tracing::info!(
            date = %snapshot.date,
            services = snapshot.services.len(),
            "Snapshot written"
        );
        Ok(())
    }

    /// The snapshot for `date`; without a date, today's or else the latest written.
    pub fn read(&self, date: Option<NaiveDate>) -> Result<Arc<DailySnapshot>, CacheError> {
        self.read_at(date, today_utc())
    }

    /// [`read`](Self::read) with an explicit notion of today.
    pub fn read_at(&self, date: Option<NaiveDate>, today: NaiveDate) -> Result<Arc<DailySnapshot>, CacheError> {
        let result = match date {
            Some(date) => self.load(date)?.ok_or(CacheError::NotFound(date)),
            None => match self.load(today)? {
                Some(snapshot) => Ok(snapshot),
                None => match self.latest_pointer()? {
                    Some(latest) => self.load(latest)?.ok_or(CacheError::NothingCached),
                    None => Err(CacheError::NothingCached),
                },
            },
        };
        metrics::record_cache_read(if result.is_ok() { "hit" } else { "miss" });
        result
    }

    /// Dates with a stored snapshot, newest first.
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>, CacheError> {
        let mut dates: Vec<NaiveDate> = self
            .store
            .list()?
            .iter()
            .filter_map(|key| parse_snapshot_key(key))
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        Ok(dates)
    }

    /// Merge every stored snapshot from the Saturday before `friday` through `friday`.
    pub fn merge_week(&self, friday: NaiveDate) -> Result<WeekLookup, CacheError> {
        let start = friday - Duration::days(6);
        let mut days = Vec::new();

        for offset in 0..7 {
            let date = start + Duration::days(offset);
            match self.load(date) {
                Ok(Some(snapshot)) => days.push(snapshot),
                Ok(None) => {}
                Err(e @ CacheError::Corrupt { .. }) => {
                    tracing::warn!(date = %date, error = %e, "Skipping unreadable snapshot in weekly merge");
                }
                Err(e) => return Err(e),
            }
        }

        if days.is_empty() {
            return Ok(WeekLookup::NoData { start, end: friday });
        }

        let dates: Vec<NaiveDate> = days.iter().map(|d| d.date).collect();
        tracing::debug!(start = %start, end = %friday, days = dates.len(), "Merging week");

        Ok(WeekLookup::Merged(WeeklyRollup {
            start,
            end: friday,
            services: merge_services(&days, self.caps),
            days_present: dates.len(),
            dates,
        }))
    }

    fn latest_pointer(&self) -> Result<Option<NaiveDate>, CacheError> {
        let Some(raw) = self.store.get(LATEST_KEY)? else {
            return Ok(None);
        };
        match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
            Ok(date) => Ok(Some(date)),
            Err(e) => {
                tracing::warn!(value = %raw, error = %e, "Ignoring malformed latest pointer");
                Ok(None)
            }
        }
    }

    fn load(&self, date: NaiveDate) -> Result<Option<Arc<DailySnapshot>>, CacheError> {
        if let Some(hit) = self.local.as_ref().and_then(|l| l.get(&date).map(|r| r.value().clone())) {
            return Ok(Some(hit));
        }

        let key = snapshot_key(date);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        let snapshot: DailySnapshot =
            serde_json::from_str(&raw).map_err(|source| CacheError::Corrupt { key, source })?;
        let snapshot = Arc::new(snapshot);

        if let Some(local) = &self.local {
            local.insert(date, snapshot.clone());
        }
        Ok(Some(snapshot))
    }
}

struct MergedPath {
    path: String,
    times: Vec<Timestamp>,
    /// Message text → earliest time seen.
    messages: HashMap<String, Timestamp>,
}

struct MergedService {
    report: ServiceReport,
    paths: Vec<MergedPath>,
    path_slots: HashMap<String, usize>,
}

fn has_value(program_name: &str) -> bool {
    !program_name.trim().is_empty() && program_name != UNKNOWN_PROGRAM
}

/// Sum counts per service across days and union their paths.
pub fn merge_services(days: &[Arc<DailySnapshot>], caps: MergeCaps) -> Vec<ServiceReport> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<MergedService> = Vec::new();

    for day in days {
        for report in &day.services {
            let slot = *slots.entry(report.service_id.clone()).or_insert_with(|| {
                merged.push(MergedService {
                    report: ServiceReport {
                        paths: Vec::new(),
                        error_count: 0,
                        total_submissions: 0,
                        ticket: None,
                        program_name: UNKNOWN_PROGRAM.to_string(),
                        ..report.clone()
                    },
                    paths: Vec::new(),
                    path_slots: HashMap::new(),
                });
                merged.len() - 1
            });
            let MergedService { report: acc, paths, path_slots } = &mut merged[slot];

            acc.error_count += report.error_count;
            acc.total_submissions += report.total_submissions;
            if !has_value(&acc.program_name) && has_value(&report.program_name) {
                acc.program_name = report.program_name.clone();
            }
            if acc.ticket.is_none() {
                acc.ticket = report.ticket.clone();
            }

            for path in &report.paths {
                let path_slot = *path_slots.entry(path.path.clone()).or_insert_with(|| {
                    paths.push(MergedPath {
                        path: path.path.clone(),
                        times: Vec::new(),
                        messages: HashMap::new(),
                    });
                    paths.len() - 1
                });
                let target = &mut paths[path_slot];
                target.times.extend(path.failure_times.iter().copied());
                for msg in &path.messages {
                    target
                        .messages
                        .entry(msg.message.clone())
                        .and_modify(|t| *t = (*t).min(msg.time))
                        .or_insert(msg.time);
                }
            }
        }
    }

    let mut services: Vec<ServiceReport> = merged
        .into_iter()
        .map(|entry| {
            let mut report = entry.report;
            report.failure_rate_pct = failure_rate_pct(report.error_count, report.total_submissions);
            report.paths = entry.paths.into_iter().map(|p| finish_path(p, caps)).collect();
            report
        })
        .collect();

    services.sort_by(|a, b| b.error_count.cmp(&a.error_count));
    services
}

fn finish_path(merged: MergedPath, caps: MergeCaps) -> PathReport {
    let mut times = merged.times;
    times.sort_unstable_by(|a, b| b.cmp(a));
    times.dedup();
    times.truncate(caps.failure_times);

    let mut messages: Vec<PathMessage> = merged
        .messages
        .into_iter()
        .map(|(message, time)| PathMessage { time, message })
        .collect();
    messages.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.message.cmp(&b.message)));
    messages.truncate(caps.messages);

    PathReport {
        path: merged.path,
        failure_times: times,
        messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{FsStore, MemoryStore};
    use crate::sources::TicketRef;
    use crate::time::TimeRange;
    use chrono::{TimeZone, Utc};

    const CAPS: MergeCaps = MergeCaps { failure_times: 10, messages: 4 };

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, DATE_FORMAT).unwrap()
    }

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse(raw).unwrap()
    }

    fn service(id: &str, errors: u64, total: u64) -> ServiceReport {
        ServiceReport {
            service_id: id.to_string(),
            program_name: format!("Program {}", id),
            error_count: errors,
            total_submissions: total,
            failure_rate_pct: failure_rate_pct(errors, total),
            ticket: None,
            paths: Vec::new(),
        }
    }

    fn snapshot(day: &str, services: Vec<ServiceReport>) -> DailySnapshot {
        let generated = Utc.with_ymd_and_hms(2025, 6, 20, 1, 2, 3).unwrap();
        DailySnapshot::new(TimeRange::day(date(day)), services, generated)
    }

    fn memory_cache() -> RollupCache {
        RollupCache::new(Arc::new(MemoryStore::new()), CAPS, false)
    }

    #[test]
    fn test_write_then_read_returns_same_snapshot() {
        let cache = memory_cache();
        let mut svc = service("A", 3, 7);
        svc.paths.push(PathReport {
            path: "/submit".to_string(),
            failure_times: vec![ts("2025-06-18 10:00:00")],
            messages: vec![PathMessage { time: ts("2025-06-18 10:00:05"), message: "X".to_string() }],
        });
        let snap = snapshot("2025-06-18", vec![svc]);

        cache.write(&snap).unwrap();
        let back = cache.read(Some(date("2025-06-18"))).unwrap();
        assert_eq!(*back, snap);
    }

    #[test]
    fn test_fs_round_trip_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshot("2025-06-18", vec![service("A", 1, 3)]);

        let store = Arc::new(FsStore::open(dir.path()).unwrap());
        RollupCache::new(store, CAPS, true).write(&snap).unwrap();

        let reopened = RollupCache::new(Arc::new(FsStore::open(dir.path()).unwrap()), CAPS, true);
        assert_eq!(*reopened.read(Some(date("2025-06-18"))).unwrap(), snap);
        assert_eq!(reopened.list_dates().unwrap(), vec![date("2025-06-18")]);
    }

    #[test]
    fn test_rewrite_replaces_snapshot() {
        let cache = RollupCache::new(Arc::new(MemoryStore::new()), CAPS, true);
        cache.write(&snapshot("2025-06-18", vec![service("A", 1, 1)])).unwrap();
        cache.write(&snapshot("2025-06-18", vec![service("B", 2, 2)])).unwrap();

        let back = cache.read(Some(date("2025-06-18"))).unwrap();
        assert_eq!(back.services[0].service_id, "B");
        assert_eq!(cache.list_dates().unwrap().len(), 1);
    }

    #[test]
    fn test_read_without_date_prefers_today_then_latest() {
        let cache = memory_cache();
        cache.write(&snapshot("2025-06-19", vec![service("today", 1, 1)])).unwrap();
        cache.write(&snapshot("2025-06-17", vec![service("older", 1, 1)])).unwrap();

        let today = cache.read_at(None, date("2025-06-19")).unwrap();
        assert_eq!(today.date, date("2025-06-19"));

        // No snapshot for "today": fall back to the last written one.
        let fallback = cache.read_at(None, date("2025-06-25")).unwrap();
        assert_eq!(fallback.date, date("2025-06-17"));
    }

    #[test]
    fn test_missing_date_is_typed_not_found() {
        let cache = memory_cache();
        let err = cache.read(Some(date("2025-06-18"))).unwrap_err();
        assert!(matches!(err, CacheError::NotFound(d) if d == date("2025-06-18")));

        let err = cache.read_at(None, date("2025-06-18")).unwrap_err();
        assert!(matches!(err, CacheError::NothingCached));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_dates_descending() {
        let cache = memory_cache();
        for day in ["2025-06-16", "2025-06-18", "2025-06-17"] {
            cache.write(&snapshot(day, Vec::new())).unwrap();
        }
        assert_eq!(
            cache.list_dates().unwrap(),
            vec![date("2025-06-18"), date("2025-06-17"), date("2025-06-16")]
        );
    }

    #[test]
    fn test_week_with_two_days_sums_counts() {
        // 2025-06-20 is a Friday; its week starts Saturday 2025-06-14.
        let cache = memory_cache();
        cache.write(&snapshot("2025-06-16", vec![service("A", 3, 10)])).unwrap();
        cache.write(&snapshot("2025-06-18", vec![service("A", 5, 30)])).unwrap();

        let WeekLookup::Merged(week) = cache.merge_week(date("2025-06-20")).unwrap() else {
            panic!("expected merged week");
        };
        assert_eq!(week.start, date("2025-06-14"));
        assert_eq!(week.days_present, 2);
        assert_eq!(week.dates, vec![date("2025-06-16"), date("2025-06-18")]);
        assert_eq!(week.services[0].error_count, 8);
        assert_eq!(week.services[0].total_submissions, 40);
        assert_eq!(week.services[0].failure_rate_pct, 20.0);
    }

    #[test]
    fn test_week_ignores_days_outside_window() {
        let cache = memory_cache();
        cache.write(&snapshot("2025-06-13", vec![service("A", 100, 100)])).unwrap();
        cache.write(&snapshot("2025-06-14", vec![service("A", 1, 1)])).unwrap();
        cache.write(&snapshot("2025-06-21", vec![service("B", 100, 100)])).unwrap();

        let WeekLookup::Merged(week) = cache.merge_week(date("2025-06-20")).unwrap() else {
            panic!("expected merged week");
        };
        assert_eq!(week.services.len(), 1);
        assert_eq!(week.services[0].error_count, 1);
    }

    #[test]
    fn test_empty_week_is_no_data() {
        let cache = memory_cache();
        assert_eq!(
            cache.merge_week(date("2025-06-20")).unwrap(),
            WeekLookup::NoData { start: date("2025-06-14"), end: date("2025-06-20") }
        );
    }

    #[test]
    fn test_merge_fills_names_and_tickets_from_first_day_with_value() {
        let mut first = service("A", 1, 0);
        first.program_name = UNKNOWN_PROGRAM.to_string();
        let mut second = service("A", 1, 0);
        second.ticket = Some(TicketRef { key: "OPS-1".to_string(), url: "https://t/browse/OPS-1".to_string() });
        let mut third = service("A", 1, 0);
        third.program_name = "Later".to_string();
        third.ticket = Some(TicketRef { key: "OPS-2".to_string(), url: "https://t/browse/OPS-2".to_string() });

        let days = vec![
            Arc::new(snapshot("2025-06-16", vec![first])),
            Arc::new(snapshot("2025-06-17", vec![second])),
            Arc::new(snapshot("2025-06-18", vec![third])),
        ];
        let merged = merge_services(&days, CAPS);

        assert_eq!(merged[0].program_name, "Program A");
        assert_eq!(merged[0].ticket.as_ref().unwrap().key, "OPS-1");
        assert_eq!(merged[0].failure_rate_pct, 0.0);
    }

    #[test]
    fn test_merge_paths_keeps_earliest_message_and_caps() {
        let path = |times: &[&str], msgs: &[(&str, &str)]| PathReport {
            path: "/submit".to_string(),
            failure_times: times.iter().map(|t| ts(t)).collect(),
            messages: msgs
                .iter()
                .map(|(t, m)| PathMessage { time: ts(t), message: m.to_string() })
                .collect(),
        };
        let mut mon = service("A", 1, 1);
        mon.paths.push(path(&["2025-06-16 10:00:00"], &[("2025-06-16 10:00:03", "NPE"), ("2025-06-16 10:00:04", "OOM")]));
        let mut tue = service("A", 1, 1);
        tue.paths.push(path(
            &["2025-06-17 09:00:00", "2025-06-16 10:00:00"],
            &[("2025-06-15 23:59:59", "NPE"), ("2025-06-17 09:00:01", "IO"), ("2025-06-17 09:00:02", "TLS")],
        ));

        let days = vec![Arc::new(snapshot("2025-06-16", vec![mon])), Arc::new(snapshot("2025-06-17", vec![tue]))];
        let merged = merge_services(&days, MergeCaps { failure_times: 10, messages: 3 });
        let p = &merged[0].paths[0];

        assert_eq!(p.failure_times, vec![ts("2025-06-17 09:00:00"), ts("2025-06-16 10:00:00")]);
        let texts: Vec<_> = p.messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["NPE", "OOM", "IO"]);
        assert_eq!(p.messages[0].time, ts("2025-06-15 23:59:59"));
    }

    #[test]
    fn test_merge_orders_by_summed_count() {
        let days = vec![
            Arc::new(snapshot("2025-06-16", vec![service("A", 5, 0), service("B", 4, 0)])),
            Arc::new(snapshot("2025-06-17", vec![service("B", 4, 0)])),
        ];
        let merged = merge_services(&days, CAPS);
        let ids: Vec<_> = merged.iter().map(|s| s.service_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }
}
