//! WindowCorrelator: attributes diagnostic events to failing paths.
//!
//! # Responsibilities
//! - Build one window per (path, failure time) pair
//! - Fetch diagnostics for the whole range in a single search
//! - Assign each event to the first containing window, dedup by text, cap at M
//!
//! # Design Decisions
//! - One search per service regardless of window count (bounded round-trips)
//! - Assignment depends only on discovery order, so reruns are reproducible
//! - Malformed rows are dropped, never surfaced

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::correlate::types::{CorrelatedMessages, DiagnosticEvent, LocatedFailures, ParseError, PathMessage};
use crate::correlate::window::WindowIndex;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::sources::query::{QueryShapes, ServiceFilter};
use crate::sources::{fields, field, EventStore, Row};
use crate::time::{TimeRange, Timestamp};

/// Suffix appended to messages cut at the line limit.
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Tunables for one correlation pass.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationLimits {
    /// Δ in seconds.
    pub window_secs: u64,
    /// M.
    pub message_cap: usize,
    pub max_message_lines: usize,
}

#[derive(Clone)]
pub struct WindowCorrelator {
    store: Arc<dyn EventStore>,
    shapes: QueryShapes,
    limits: CorrelationLimits,
    deadline: Duration,
}

impl WindowCorrelator {
    pub fn new(store: Arc<dyn EventStore>, shapes: QueryShapes, limits: CorrelationLimits, deadline: Duration) -> Self {
        Self {
            store,
            shapes,
            limits,
            deadline,
        }
    }

    /// Correlate diagnostics for one service against its located failures.
    ///
    /// Never fails: a store error yields no messages.
    pub async fn correlate(&self, filter: &ServiceFilter, range: TimeRange, failures: &LocatedFailures) -> CorrelatedMessages {
        let index = WindowIndex::build(failures, self.limits.window_secs);
        if index.is_empty() {
            return CorrelatedMessages::default();
        }

        let query = self.shapes.diagnostics(filter, range);
        let rows = match with_deadline(self.deadline, self.store.query(&query)).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(service = %filter.service_id, error = %e, "Diagnostic search failed, no messages correlated");
                return CorrelatedMessages::default();
            }
        };

        let events = rows
            .iter()
            .filter_map(|row| match parse_diagnostic(row, self.limits.max_message_lines) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::trace!(error = %e, "Dropping diagnostic row");
                    None
                }
            });
        let correlated = assign_events(events, &index, failures, self.limits.message_cap);

        tracing::debug!(
            service = %filter.service_id,
            windows = index.len(),
            diagnostics = rows.len(),
            messages = correlated.message_count(),
            "Correlated diagnostics"
        );
        metrics::record_correlated_messages(correlated.message_count());
        correlated
    }
}

/// Parse one diagnostic row into a normalised event.
pub fn parse_diagnostic(row: &Row, max_lines: usize) -> Result<DiagnosticEvent, ParseError> {
    let raw_time = field(row, fields::EVENT_TIME).ok_or(ParseError::MissingField(fields::EVENT_TIME))?;
    let time = Timestamp::parse(raw_time).ok_or_else(|| ParseError::BadTimestamp(raw_time.to_string()))?;
    let message = field(row, fields::MESSAGE).ok_or(ParseError::EmptyMessage)?;

    Ok(DiagnosticEvent {
        time,
        message: truncate_lines(message, max_lines),
    })
}

/// Keep the first `max_lines` lines, marking the cut.
pub fn truncate_lines(message: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = message.lines().collect();
    if lines.len() <= max_lines {
        return lines.join("\n");
    }
    let mut kept = lines[..max_lines].join("\n");
    kept.push('\n');
    kept.push_str(TRUNCATION_MARKER);
    kept
}

/// Assign events (in arrival order) to paths via the window index.
pub fn assign_events<I>(events: I, index: &WindowIndex, failures: &LocatedFailures, message_cap: usize) -> CorrelatedMessages
where
    I: IntoIterator<Item = DiagnosticEvent>,
{
    let paths: Vec<&str> = failures.iter().map(|p| p.path.as_str()).collect();
    let mut seen: HashMap<usize, HashSet<String>> = HashMap::new();
    let mut out = CorrelatedMessages::default();

    for event in events {
        let Some(window) = index.first_containing(event.time) else {
            continue;
        };
        let slot = window.path_slot;
        let seen_for_path = seen.entry(slot).or_default();
        if seen_for_path.len() >= message_cap || seen_for_path.contains(&event.message) {
            continue;
        }

        seen_for_path.insert(event.message.clone());
        out.entry(paths[slot]).push(PathMessage {
            time: event.time,
            message: event.message,
        });
    }
    out
}
