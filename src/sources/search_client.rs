//! Search REST client implementing [`EventStore`].
//!
//! # Responsibilities
//! - Submit a blocking search job and recover its sid (JSON or XML reply)
//! - Fetch the job results as JSON rows
//! - Apply the configured deadline and retry policy to each HTTP call

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{EventStoreConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::retries::retry;
use crate::resilience::timeouts::with_deadline;
use crate::sources::{EventQuery, EventStore, Row, SourceError};

/// Time bound format understood by the search endpoint.
const SEARCH_TIME_FORMAT: &str = "%m/%d/%Y:%H:%M:%S";

/// HTTP client for the event store's search API.
#[derive(Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    config: EventStoreConfig,
    retries: RetryConfig,
    deadline: Duration,
}

impl SearchClient {
    pub fn new(config: EventStoreConfig, retries: RetryConfig, deadline: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(deadline)
            .build()?;

        Ok(Self {
            client,
            config,
            retries,
            deadline,
        })
    }

    fn jobs_url(&self) -> String {
        format!("{}/services/search/jobs", self.config.base_url.trim_end_matches('/'))
    }

    fn search_text(query: &EventQuery) -> String {
        // Time bounds must precede the first pipe to scope the base search.
        let (base, pipeline) = match query.filter.find('|') {
            Some(idx) => (query.filter[..idx].trim_end(), &query.filter[idx..]),
            None => (query.filter.as_str(), ""),
        };
        format!(
            "search {} earliest=\"{}\" latest=\"{}\" {}",
            base,
            query.range.earliest.format_with(SEARCH_TIME_FORMAT),
            query.range.latest.format_with(SEARCH_TIME_FORMAT),
            pipeline,
        )
        .trim_end()
        .to_string()
    }

    async fn submit(&self, search: &str) -> Result<String, SourceError> {
        let response = self
            .client
            .post(self.jobs_url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .form(&[("search", search), ("exec_mode", "blocking"), ("output_mode", "json")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::Status { status: status.as_u16(), body });
        }
        parse_sid(&body).ok_or(SourceError::MissingSid)
    }

    async fn results(&self, sid: &str) -> Result<Vec<Row>, SourceError> {
        let response = self
            .client
            .get(format!("{}/{}/results", self.jobs_url(), sid))
            .query(&[("output_mode", "json"), ("count", "0")])
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status: status.as_u16(), body });
        }
        let body: Value = response.json().await?;
        parse_results(&body)
    }
}

#[async_trait]
impl EventStore for SearchClient {
    async fn query(&self, query: &EventQuery) -> Result<Vec<Row>, SourceError> {
        let started = Instant::now();
        let kind = query.kind.as_str();
        let search = Self::search_text(query);

        let outcome = with_deadline(self.deadline, async {
            let sid = retry(&self.retries, "search.submit", || self.submit(&search)).await?;
            retry(&self.retries, "search.results", || self.results(&sid)).await
        })
        .await;

        match &outcome {
            Ok(rows) => {
                tracing::debug!(kind, rows = rows.len(), elapsed_ms = started.elapsed().as_millis() as u64, "Search completed");
                metrics::record_source_query(kind, "ok", started);
            }
            Err(e) => {
                tracing::warn!(kind, error = %e, elapsed_ms = started.elapsed().as_millis() as u64, "Search failed");
                metrics::record_source_query(kind, "error", started);
            }
        }
        outcome
    }
}

/// Extract the job id from either a JSON (`{"sid": ...}`) or XML (`<sid>...</sid>`) reply.
pub fn parse_sid(body: &str) -> Option<String> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(sid) = map.get("sid").and_then(Value::as_str) {
            return Some(sid.to_string()).filter(|s| !s.is_empty());
        }
    }

    let start = body.find("<sid>")? + "<sid>".len();
    let end = body[start..].find("</sid>")? + start;
    let sid = body[start..end].trim();
    (!sid.is_empty()).then(|| sid.to_string())
}

/// Flatten `{"results": [{...}, ...]}` into string rows.
///
/// Multi-valued fields keep their first value; non-string scalars are rendered.
pub fn parse_results(body: &Value) -> Result<Vec<Row>, SourceError> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Decode("missing 'results' array".to_string()))?;

    let rows = results
        .iter()
        .filter_map(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, value)| scalar(value).map(|v| (key.clone(), v)))
                .collect::<Row>()
        })
        .collect();
    Ok(rows)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.first().and_then(scalar),
        Value::Null | Value::Object(_) => None,
    }
}
