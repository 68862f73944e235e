//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use failure_rollup::cache::{KvStore, MemoryStore};
use failure_rollup::config::ReportConfig;
use failure_rollup::correlate::Collaborators;
use failure_rollup::report::ReportService;
use failure_rollup::sources::{
    EventQuery, EventStore, IssueTracker, QueryKind, Row, SourceError, SubmissionTotals, TicketRef,
};
use failure_rollup::time::{TimeRange, Timestamp};

pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn ts(raw: &str) -> Timestamp {
    Timestamp::parse(raw).unwrap()
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

/// The service id a per-service filter is scoped to.
fn scoped_service(filter: &str) -> Option<String> {
    filter
        .split_whitespace()
        .find_map(|term| term.strip_prefix("aem_service="))
        .map(str::to_string)
}

/// Event store answering from per-shape, per-service scripts.
#[derive(Default)]
pub struct ScriptedStore {
    pub ranking: Vec<Row>,
    /// Ranking rows for searches starting on a given day; overrides `ranking`.
    pub ranking_by_day: HashMap<NaiveDate, Vec<Row>>,
    pub failures: HashMap<String, Vec<Row>>,
    pub diagnostics: HashMap<String, Vec<Row>>,
    pub daily: Vec<Row>,
    /// Every query scoped to one of these services fails.
    pub broken: HashSet<String>,
    /// Every query scoped to one of these services stalls.
    pub stalled: HashSet<String>,
    /// Ranking search fails.
    pub ranking_down: bool,
    calls: Mutex<Vec<(QueryKind, Option<String>)>>,
}

impl ScriptedStore {
    pub fn rank(mut self, service: &str, program: &str, count: u64) -> Self {
        self.ranking.push(row(&[
            ("service", service),
            ("program_name", program),
            ("error_count", &count.to_string()),
        ]));
        self
    }

    pub fn rank_on(mut self, day: NaiveDate, service: &str, program: &str, count: u64) -> Self {
        self.ranking_by_day.entry(day).or_default().push(row(&[
            ("service", service),
            ("program_name", program),
            ("error_count", &count.to_string()),
        ]));
        self
    }

    pub fn failure(mut self, service: &str, path: &str, time: &str) -> Self {
        self.failures
            .entry(service.to_string())
            .or_default()
            .push(row(&[("path", path), ("failure_time", time)]));
        self
    }

    pub fn diagnostic(mut self, service: &str, time: &str, msg: &str) -> Self {
        self.diagnostics
            .entry(service.to_string())
            .or_default()
            .push(row(&[("event_time", time), ("msg", msg)]));
        self
    }

    pub fn calls_of(&self, kind: QueryKind, service: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, s)| *k == kind && s.as_deref() == Some(service))
            .count()
    }
}

#[async_trait]
impl EventStore for ScriptedStore {
    async fn query(&self, query: &EventQuery) -> Result<Vec<Row>, SourceError> {
        let service = scoped_service(&query.filter);
        self.calls.lock().unwrap().push((query.kind, service.clone()));

        if let Some(svc) = &service {
            if self.broken.contains(svc) {
                return Err(SourceError::Status { status: 500, body: "boom".to_string() });
            }
            if self.stalled.contains(svc) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }

        let scripted = |map: &HashMap<String, Vec<Row>>| {
            service.as_ref().and_then(|s| map.get(s)).cloned().unwrap_or_default()
        };
        match query.kind {
            QueryKind::RankedServices if self.ranking_down => Err(SourceError::Unreachable("down".to_string())),
            QueryKind::RankedServices => Ok(self
                .ranking_by_day
                .get(&query.range.earliest.date())
                .unwrap_or(&self.ranking)
                .clone()),
            QueryKind::PathFailures => Ok(scripted(&self.failures)),
            QueryKind::Diagnostics => Ok(scripted(&self.diagnostics)),
            QueryKind::DailyCounts => Ok(self.daily.clone()),
            QueryKind::SubmissionTotal => Ok(Vec::new()),
        }
    }
}

/// Tickets by service id; ids in `broken` error out, ids in `panicking` panic.
#[derive(Default)]
pub struct ScriptedTracker {
    pub tickets: HashMap<String, TicketRef>,
    pub broken: HashSet<String>,
    pub panicking: HashSet<String>,
}

impl ScriptedTracker {
    pub fn ticket(mut self, service: &str, key: &str) -> Self {
        self.tickets.insert(
            service.to_string(),
            TicketRef {
                key: key.to_string(),
                url: format!("https://tracker.example/browse/{}", key),
            },
        );
        self
    }
}

#[async_trait]
impl IssueTracker for ScriptedTracker {
    async fn search_by_service_id(&self, service_id: &str) -> Result<Option<TicketRef>, SourceError> {
        if self.panicking.contains(service_id) {
            panic!("tracker blew up for {}", service_id);
        }
        if self.broken.contains(service_id) {
            return Err(SourceError::Unreachable("tracker down".to_string()));
        }
        Ok(self.tickets.get(service_id).cloned())
    }
}

#[derive(Default)]
pub struct ScriptedTotals {
    pub totals: HashMap<String, u64>,
    pub broken: HashSet<String>,
}

impl ScriptedTotals {
    pub fn total(mut self, service: &str, total: u64) -> Self {
        self.totals.insert(service.to_string(), total);
        self
    }
}

#[async_trait]
impl SubmissionTotals for ScriptedTotals {
    async fn total_submissions(&self, service_id: &str, _range: &TimeRange) -> Result<u64, SourceError> {
        if self.broken.contains(service_id) {
            return Err(SourceError::Timeout(1));
        }
        Ok(self.totals.get(service_id).copied().unwrap_or(0))
    }
}

/// Defaults with short deadlines so stalled collaborators fail fast.
pub fn test_config() -> ReportConfig {
    let mut config = ReportConfig::default();
    config.timeouts.query_secs = 1;
    config.timeouts.service_secs = 2;
    config.retries.enabled = false;
    config
}

pub struct Harness {
    pub store: Arc<ScriptedStore>,
    pub kv: Arc<MemoryStore>,
    pub reports: ReportService,
}

pub fn harness(config: &ReportConfig, store: ScriptedStore, tracker: ScriptedTracker, totals: ScriptedTotals) -> Harness {
    let store = Arc::new(store);
    let kv = Arc::new(MemoryStore::new());
    let collaborators = Collaborators {
        store: store.clone(),
        tracker: Arc::new(tracker),
        totals: Arc::new(totals),
    };
    let kv_dyn: Arc<dyn KvStore> = kv.clone();
    let reports = ReportService::from_config(config, collaborators, kv_dyn);
    Harness { store, kv, reports }
}

/// Start a programmable HTTP backend; `f` gets the request line and answers (status, body).
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let Some(request_line) = read_request(&mut socket).await else {
                    return;
                };
                let (status, body) = f(request_line).await;
                let status_text = match status {
                    200 => "200 OK",
                    201 => "201 Created",
                    404 => "404 Not Found",
                    429 => "429 Too Many Requests",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Read the head and any declared body; returns the request line.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    head.lines().next().map(str::to_string)
}

/// Counts calls to a programmable backend.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
