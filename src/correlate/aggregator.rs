//! ServiceAggregator: one structured report per ranked service.
//!
//! # Data Flow
//! ```text
//! ranking search → RankedService list (ordered by failure count)
//!     → per service, at most `max_concurrent_services` in flight:
//!         ticket lookup   (failure → no ticket)
//!         totals lookup   (failure → 0)
//!         FailureLocator  → WindowCorrelator   (strictly sequential)
//!         → ServiceReport
//!     → results re-emitted in ranking order
//! ```
//!
//! # Design Decisions
//! - Each service runs in its own task; its outcome is a `Result`, so a
//!   panic or deadline hit degrades only that service
//! - `buffered` keeps submission order, so output order is the ranking order

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use thiserror::Error;

use crate::config::ReportConfig;
use crate::correlate::correlator::{CorrelationLimits, WindowCorrelator};
use crate::correlate::locator::FailureLocator;
use crate::correlate::types::{failure_rate_pct, PathReport, RankedService, ServiceReport, UNKNOWN_PROGRAM};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::sources::query::QueryShapes;
use crate::sources::{fields, field, EventStore, IssueTracker, Row, SubmissionTotals};
use crate::time::TimeRange;

/// Knobs for one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub limits: CorrelationLimits,
    /// K.
    pub failure_cap: usize,
    pub top_services: usize,
    pub max_concurrent_services: usize,
    pub query_deadline: Duration,
    pub service_deadline: Duration,
}

impl From<&ReportConfig> for AggregatorSettings {
    fn from(config: &ReportConfig) -> Self {
        let c = &config.correlation;
        Self {
            limits: CorrelationLimits {
                window_secs: c.window_secs,
                message_cap: c.per_path_message_cap,
                max_message_lines: c.max_message_lines,
            },
            failure_cap: c.per_path_failure_cap,
            top_services: c.top_services,
            max_concurrent_services: c.max_concurrent_services.max(1),
            query_deadline: Duration::from_secs(config.timeouts.query_secs),
            service_deadline: Duration::from_secs(config.timeouts.service_secs),
        }
    }
}

/// Why a service's pipeline produced no full report.
#[derive(Debug, Error)]
pub enum ServiceFailure {
    #[error("service pipeline exceeded {0} seconds")]
    TimedOut(u64),

    #[error("service pipeline aborted: {0}")]
    Aborted(String),
}

/// Collaborators an aggregation run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn EventStore>,
    pub tracker: Arc<dyn IssueTracker>,
    pub totals: Arc<dyn SubmissionTotals>,
}

#[derive(Clone)]
pub struct ServiceAggregator {
    inner: Arc<Inner>,
}

struct Inner {
    collaborators: Collaborators,
    shapes: QueryShapes,
    locator: FailureLocator,
    correlator: WindowCorrelator,
    settings: AggregatorSettings,
}

impl ServiceAggregator {
    pub fn new(collaborators: Collaborators, shapes: QueryShapes, settings: AggregatorSettings) -> Self {
        let locator = FailureLocator::new(
            collaborators.store.clone(),
            shapes.clone(),
            settings.failure_cap,
            settings.query_deadline,
        );
        let correlator = WindowCorrelator::new(
            collaborators.store.clone(),
            shapes.clone(),
            settings.limits,
            settings.query_deadline,
        );

        Self {
            inner: Arc::new(Inner {
                collaborators,
                shapes,
                locator,
                correlator,
                settings,
            }),
        }
    }

    /// Build reports for the top services, or for `explicit` when given.
    ///
    /// Output is ordered by failure count, descending; ties keep ranking order.
    pub async fn aggregate(&self, range: TimeRange, explicit: Option<&[String]>) -> Vec<ServiceReport> {
        let ranked = self.rank(range).await;
        let candidates = select_candidates(ranked, explicit, self.inner.settings.top_services);

        tracing::info!(
            services = candidates.len(),
            earliest = %range.earliest,
            latest = %range.latest,
            "Aggregating services"
        );

        let deadline = self.inner.settings.service_deadline;
        let mut reports: Vec<ServiceReport> = stream::iter(candidates)
            .map(|service| {
                let this = self.clone();
                let task_service = service.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::timeout(deadline, this.process(&task_service, range)).await
                });
                async move {
                    let outcome = match handle.await {
                        Ok(Ok(report)) => Ok(report),
                        Ok(Err(_)) => Err(ServiceFailure::TimedOut(deadline.as_secs())),
                        Err(e) => Err(ServiceFailure::Aborted(e.to_string())),
                    };
                    (service, outcome)
                }
            })
            .buffered(self.inner.settings.max_concurrent_services)
            .map(|(service, outcome)| match outcome {
                Ok(report) => {
                    metrics::record_service_processed("ok");
                    report
                }
                Err(e) => {
                    tracing::warn!(service = %service.id, error = %e, "Service pipeline failed, emitting degraded report");
                    metrics::record_service_processed("degraded");
                    ServiceReport::degraded(&service)
                }
            })
            .collect()
            .await;

        reports.sort_by(|a, b| b.error_count.cmp(&a.error_count));
        reports
    }

    /// Ranked failing services; an erroring store yields no services.
    pub async fn rank(&self, range: TimeRange) -> Vec<RankedService> {
        let query = self.inner.shapes.ranked_services(range);
        match with_deadline(self.inner.settings.query_deadline, self.inner.collaborators.store.query(&query)).await {
            Ok(rows) => parse_ranking(&rows),
            Err(e) => {
                tracing::warn!(error = %e, "Service ranking search failed, no services to report");
                Vec::new()
            }
        }
    }

    async fn process(&self, service: &RankedService, range: TimeRange) -> ServiceReport {
        let inner = &self.inner;
        let deadline = inner.settings.query_deadline;
        let collaborators = &inner.collaborators;

        let ticket = match with_deadline(deadline, collaborators.tracker.search_by_service_id(&service.id)).await {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!(service = %service.id, error = %e, "Ticket lookup failed");
                None
            }
        };

        let total_submissions = match with_deadline(deadline, collaborators.totals.total_submissions(&service.id, &range)).await {
            Ok(total) => total,
            Err(e) => {
                tracing::warn!(service = %service.id, error = %e, "Submission totals lookup failed");
                0
            }
        };

        let filter = inner.shapes.service_filter(&service.id);
        let failures = inner.locator.locate(&filter, range).await;
        let mut messages = inner.correlator.correlate(&filter, range, &failures).await;

        let mut paths: Vec<PathReport> = failures
            .iter()
            .map(|located| PathReport {
                path: located.path.clone(),
                failure_times: located.times.clone(),
                messages: messages.take(&located.path).unwrap_or_default(),
            })
            .collect();

        // Paths known only to the correlator, in a stable order.
        let mut leftover: Vec<String> = messages.paths().map(str::to_string).collect();
        leftover.sort();
        for path in leftover {
            let msgs = messages.take(&path).unwrap_or_default();
            paths.push(PathReport {
                path,
                failure_times: Vec::new(),
                messages: msgs,
            });
        }

        ServiceReport {
            service_id: service.id.clone(),
            program_name: service.program_name.clone(),
            error_count: service.error_count,
            total_submissions,
            failure_rate_pct: failure_rate_pct(service.error_count, total_submissions),
            ticket,
            paths,
        }
    }
}

/// Parse ranking rows, merging duplicate service ids and ordering by count.
pub fn parse_ranking(rows: &[Row]) -> Vec<RankedService> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut ranked: Vec<RankedService> = Vec::new();

    for row in rows {
        let Some(id) = field(row, fields::SERVICE) else {
            continue;
        };
        let program = field(row, fields::PROGRAM_NAME).unwrap_or(UNKNOWN_PROGRAM);
        let count = field(row, fields::ERROR_COUNT)
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);

        match slots.get(id) {
            Some(&slot) => {
                let existing = &mut ranked[slot];
                existing.error_count += count;
                if existing.program_name == UNKNOWN_PROGRAM {
                    existing.program_name = program.to_string();
                }
            }
            None => {
                slots.insert(id.to_string(), ranked.len());
                ranked.push(RankedService {
                    id: id.to_string(),
                    program_name: program.to_string(),
                    error_count: count,
                });
            }
        }
    }

    ranked.sort_by(|a, b| b.error_count.cmp(&a.error_count));
    ranked
}

/// Top `top` ranked services, or the explicit list (ranked ones first, in
/// ranking order, then unranked ones with zero failures in the given order).
pub fn select_candidates(ranked: Vec<RankedService>, explicit: Option<&[String]>, top: usize) -> Vec<RankedService> {
    let Some(wanted) = explicit else {
        return ranked.into_iter().take(top).collect();
    };

    let mut selected: Vec<RankedService> = ranked
        .into_iter()
        .filter(|svc| wanted.iter().any(|w| w == &svc.id))
        .collect();

    for id in wanted {
        if id.is_empty() || selected.iter().any(|svc| &svc.id == id) {
            continue;
        }
        selected.push(RankedService {
            id: id.clone(),
            program_name: UNKNOWN_PROGRAM.to_string(),
            error_count: 0,
        });
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(service: &str, program: &str, count: &str) -> Row {
        [
            ("service".to_string(), service.to_string()),
            ("program_name".to_string(), program.to_string()),
            ("error_count".to_string(), count.to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn ranked(id: &str, count: u64) -> RankedService {
        RankedService {
            id: id.to_string(),
            program_name: format!("prog-{}", id),
            error_count: count,
        }
    }

    #[test]
    fn test_parse_ranking_orders_and_defaults() {
        let rows = vec![
            row("svc-b", "", "3"),
            row("svc-a", "Alpha", "12"),
            row("", "Ghost", "99"),
            row("svc-c", "Gamma", "n/a"),
        ];
        let out = parse_ranking(&rows);

        let ids: Vec<_> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["svc-a", "svc-b", "svc-c"]);
        assert_eq!(out[1].program_name, UNKNOWN_PROGRAM);
        assert_eq!(out[2].error_count, 0);
    }

    #[test]
    fn test_parse_ranking_merges_duplicates() {
        let rows = vec![row("svc-a", "", "2"), row("svc-a", "Alpha", "5")];
        let out = parse_ranking(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].error_count, 7);
        assert_eq!(out[0].program_name, "Alpha");
    }

    #[test]
    fn test_select_top_n() {
        let out = select_candidates(vec![ranked("a", 9), ranked("b", 5), ranked("c", 1)], None, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].id, "b");
    }

    #[test]
    fn test_select_explicit_keeps_ranking_then_appends_unranked() {
        let wanted = vec!["z".to_string(), "c".to_string(), "a".to_string()];
        let out = select_candidates(vec![ranked("a", 9), ranked("b", 5), ranked("c", 1)], Some(&wanted), 1);

        let ids: Vec<_> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "z"]);
        assert_eq!(out[2].error_count, 0);
        assert_eq!(out[2].program_name, UNKNOWN_PROGRAM);
    }
}
