//! FailureLocator: the most recent failure timestamps per path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::correlate::types::{LocatedFailures, ParseError, PathFailures};
use crate::resilience::timeouts::with_deadline;
use crate::sources::query::{QueryShapes, ServiceFilter};
use crate::sources::{fields, field, EventStore, Row, SourceError};
use crate::time::{TimeRange, Timestamp};

/// Finds failing paths for a service and keeps the newest K timestamps of each.
#[derive(Clone)]
pub struct FailureLocator {
    store: Arc<dyn EventStore>,
    shapes: QueryShapes,
    per_path_cap: usize,
    deadline: Duration,
}

impl FailureLocator {
    pub fn new(store: Arc<dyn EventStore>, shapes: QueryShapes, per_path_cap: usize, deadline: Duration) -> Self {
        Self {
            store,
            shapes,
            per_path_cap,
            deadline,
        }
    }

    /// Never fails: an unreachable or erroring store yields an empty mapping.
    pub async fn locate(&self, filter: &ServiceFilter, range: TimeRange) -> LocatedFailures {
        match self.fetch(filter, range).await {
            Ok(found) => {
                tracing::debug!(
                    service = %filter.service_id,
                    paths = found.len(),
                    failures = found.timestamp_count(),
                    "Located failing paths"
                );
                found
            }
            Err(e) => {
                tracing::warn!(service = %filter.service_id, error = %e, "Failure lookup failed, treating as no failures");
                LocatedFailures::default()
            }
        }
    }

    async fn fetch(&self, filter: &ServiceFilter, range: TimeRange) -> Result<LocatedFailures, SourceError> {
        let query = self.shapes.path_failures(filter, range, self.per_path_cap);
        let rows = with_deadline(self.deadline, self.store.query(&query)).await?;
        Ok(group_failures(&rows, self.per_path_cap))
    }
}

fn parse_failure(row: &Row) -> Result<(&str, Timestamp), ParseError> {
    let path = field(row, fields::PATH).ok_or(ParseError::MissingField(fields::PATH))?;
    let raw = field(row, fields::FAILURE_TIME).ok_or(ParseError::MissingField(fields::FAILURE_TIME))?;
    let time = Timestamp::parse(raw).ok_or_else(|| ParseError::BadTimestamp(raw.to_string()))?;
    Ok((path, time))
}

/// Group rows by path (first-seen order), newest first, distinct, at most `cap` each.
///
/// The store is asked to rank and cap already; doing it again here keeps the
/// invariant independent of what the store actually returns.
pub fn group_failures(rows: &[Row], cap: usize) -> LocatedFailures {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut paths: Vec<PathFailures> = Vec::new();
    let mut dropped = 0usize;

    for row in rows {
        let (path, time) = match parse_failure(row) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::trace!(error = %e, "Dropping failure row");
                dropped += 1;
                continue;
            }
        };
        let slot = *slots.entry(path).or_insert_with(|| {
            paths.push(PathFailures {
                path: path.to_string(),
                times: Vec::new(),
            });
            paths.len() - 1
        });
        paths[slot].times.push(time);
    }

    for entry in &mut paths {
        entry.times.sort_unstable_by(|a, b| b.cmp(a));
        entry.times.dedup();
        entry.times.truncate(cap);
    }

    if dropped > 0 {
        tracing::debug!(dropped, "Dropped malformed failure rows");
    }
    LocatedFailures::new(paths)
}
