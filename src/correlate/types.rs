//! Data model shared by the locator, correlator and aggregator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sources::TicketRef;
use crate::time::Timestamp;

/// Placeholder when the program-name lookup has nothing for a service.
pub const UNKNOWN_PROGRAM: &str = "<unknown program name>";

/// A service as ranked by failure count for one reporting run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedService {
    pub id: String,
    pub program_name: String,
    pub error_count: u64,
}

/// Failure timestamps for one path, most recent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFailures {
    pub path: String,
    pub times: Vec<Timestamp>,
}

/// FailureLocator output: paths in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatedFailures {
    paths: Vec<PathFailures>,
}

impl LocatedFailures {
    pub fn new(paths: Vec<PathFailures>) -> Self {
        Self { paths }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathFailures> {
        self.paths.iter()
    }

    pub fn get(&self, path: &str) -> Option<&PathFailures> {
        self.paths.iter().find(|p| p.path == path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Total number of (path, timestamp) pairs, i.e. windows to build.
    pub fn timestamp_count(&self) -> usize {
        self.paths.iter().map(|p| p.times.len()).sum()
    }
}

/// A diagnostic event after parsing and message normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub time: Timestamp,
    pub message: String,
}

/// A diagnostic message attributed to a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMessage {
    pub time: Timestamp,
    #[serde(rename = "msg")]
    pub message: String,
}

/// WindowCorrelator output: path → messages in arrival order.
///
/// Paths that received no message are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelatedMessages {
    by_path: HashMap<String, Vec<PathMessage>>,
}

impl CorrelatedMessages {
    pub fn get(&self, path: &str) -> Option<&[PathMessage]> {
        self.by_path.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn message_count(&self) -> usize {
        self.by_path.values().map(Vec::len).sum()
    }

    pub(crate) fn entry(&mut self, path: &str) -> &mut Vec<PathMessage> {
        self.by_path.entry(path.to_string()).or_default()
    }

    pub(crate) fn take(&mut self, path: &str) -> Option<Vec<PathMessage>> {
        self.by_path.remove(path)
    }
}

/// Everything known about one path of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathReport {
    pub path: String,
    /// Most recent first, at most K entries.
    pub failure_times: Vec<Timestamp>,
    /// At most M entries, unique by text.
    pub messages: Vec<PathMessage>,
}

/// One service's line in a daily report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceReport {
    pub service_id: String,
    pub program_name: String,
    pub error_count: u64,
    pub total_submissions: u64,
    pub failure_rate_pct: f64,
    pub ticket: Option<TicketRef>,
    pub paths: Vec<PathReport>,
}

impl ServiceReport {
    /// The record emitted for a service whose pipeline failed: ranking data
    /// is kept, everything resolved later is zero or empty.
    pub fn degraded(service: &RankedService) -> Self {
        Self {
            service_id: service.id.clone(),
            program_name: service.program_name.clone(),
            error_count: service.error_count,
            total_submissions: 0,
            failure_rate_pct: 0.0,
            ticket: None,
            paths: Vec::new(),
        }
    }
}

/// `round(error_count / total_submissions * 100, 2)`, or 0.0 with no submissions.
pub fn failure_rate_pct(error_count: u64, total_submissions: u64) -> f64 {
    if total_submissions == 0 {
        return 0.0;
    }
    let pct = error_count as f64 / total_submissions as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Why a row from the event store was dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("row has no '{0}' field")]
    MissingField(&'static str),

    #[error("unparsable timestamp '{0}'")]
    BadTimestamp(String),

    #[error("empty message")]
    EmptyMessage,
}
