//! Issue tracker REST client implementing [`IssueTracker`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{IssueTrackerConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::retries::retry;
use crate::resilience::timeouts::with_deadline;
use crate::sources::{IssueTracker, SourceError, TicketRef};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    key: String,
}

/// Searches the tracker for the open incident referencing a service.
#[derive(Clone)]
pub struct TrackerClient {
    client: reqwest::Client,
    config: IssueTrackerConfig,
    retries: RetryConfig,
    deadline: Duration,
}

impl TrackerClient {
    pub fn new(config: IssueTrackerConfig, retries: RetryConfig, deadline: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(deadline).build()?;
        Ok(Self {
            client,
            config,
            retries,
            deadline,
        })
    }

    fn jql(&self, service_id: &str) -> String {
        self.config.jql_template.replace("{service}", service_id)
    }

    fn browse_link(&self, key: &str) -> String {
        let base = if self.config.browse_url.is_empty() {
            &self.config.base_url
        } else {
            &self.config.browse_url
        };
        format!("{}/browse/{}", base.trim_end_matches('/'), key)
    }

    async fn search(&self, jql: &str) -> Result<SearchResponse, SourceError> {
        let mut request = self
            .client
            .get(format!("{}/rest/api/2/search", self.config.base_url.trim_end_matches('/')))
            .query(&[("jql", jql), ("maxResults", "1"), ("fields", "key")])
            .header(reqwest::header::ACCEPT, "application/json");

        request = if !self.config.bearer_token.is_empty() {
            request.bearer_auth(&self.config.bearer_token)
        } else {
            request.basic_auth(&self.config.username, Some(&self.config.api_token))
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status: status.as_u16(), body });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl IssueTracker for TrackerClient {
    async fn search_by_service_id(&self, service_id: &str) -> Result<Option<TicketRef>, SourceError> {
        if service_id.is_empty() {
            return Ok(None);
        }

        let started = Instant::now();
        let jql = self.jql(service_id);
        let outcome = with_deadline(self.deadline, retry(&self.retries, "tracker.search", || self.search(&jql))).await;

        match outcome {
            Ok(found) => {
                metrics::record_source_query("ticket_search", "ok", started);
                Ok(found.issues.into_iter().next().map(|issue| TicketRef {
                    url: self.browse_link(&issue.key),
                    key: issue.key,
                }))
            }
            Err(e) => {
                metrics::record_source_query("ticket_search", "error", started);
                Err(e)
            }
        }
    }
}
