//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the rollup
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the failure rollup service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReportConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Event store collaborator (search endpoint + query fragments).
    pub event_store: EventStoreConfig,

    /// Issue tracker collaborator.
    pub issue_tracker: IssueTrackerConfig,

    /// Correlation window and caps.
    pub correlation: CorrelationConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration for collaborator HTTP calls.
    pub retries: RetryConfig,

    /// Snapshot cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Event store endpoint and the fragments the query shapes are assembled from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventStoreConfig {
    /// Base URL of the search REST endpoint (e.g., "https://search.internal:8089").
    pub base_url: String,

    pub username: String,

    pub password: String,

    /// Accept self-signed certificates on the search endpoint.
    pub accept_invalid_certs: bool,

    /// Index term prepended to every search.
    pub index: String,

    /// Selects request events for the monitored endpoint class.
    pub access_filter: String,

    /// Condition classifying a request event as a failure.
    pub failure_condition: String,

    /// Selects diagnostic (error-level) events for the same endpoint class.
    pub diagnostic_filter: String,

    /// Lookup clause producing `program_name` from the program id.
    pub program_lookup: String,

    /// Environment filter applied to per-service searches.
    pub env_type: String,

    /// Tier filter applied to per-service searches.
    pub tier: String,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8089".to_string(),
            username: String::new(),
            password: String::new(),
            accept_invalid_certs: true,
            index: "index=dx_aem_engineering".to_string(),
            access_filter: "sourcetype=aemaccess (path=\"/adobe/forms/af/submit*\" OR path=\"*guideContainer.af.submit.jsp\")".to_string(),
            failure_condition: "code>=500".to_string(),
            diagnostic_filter: "sourcetype=aemerror level=ERROR (*guideContainer.af.submit.jsp* OR *FormSubmitActionManagerServiceImpl* OR *AdaptiveFormSubmitServlet*)".to_string(),
            program_lookup: "lookup skyline_program_id_to_program_name program_id as aem_program_id OUTPUT program_name".to_string(),
            env_type: "prod".to_string(),
            tier: "publish".to_string(),
        }
    }
}

/// Issue tracker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IssueTrackerConfig {
    /// Enable ticket lookups. When disabled every service gets no ticket.
    pub enabled: bool,

    /// Base URL of the tracker REST API.
    pub base_url: String,

    /// Bearer token; preferred over basic auth when set.
    pub bearer_token: String,

    pub username: String,

    pub api_token: String,

    /// Search expression; `{service}` is replaced by the service identifier.
    pub jql_template: String,

    /// Base used to build browse links (`{browse_url}/browse/{key}`).
    /// Falls back to `base_url` when empty.
    pub browse_url: String,
}

impl Default for IssueTrackerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://localhost".to_string(),
            bearer_token: String::new(),
            username: String::new(),
            api_token: String::new(),
            jql_template: "project = SKYSI AND issuetype = Incident AND Alert ~ \"FormSubmitErrors\" AND status NOT IN (Resolved) AND text ~ \"{service}\"".to_string(),
            browse_url: String::new(),
        }
    }
}

/// Correlation parameters shared across one reporting run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Window length Δ in whole seconds.
    pub window_secs: u64,

    /// K: failure timestamps retained per path.
    pub per_path_failure_cap: usize,

    /// M: distinct diagnostic messages retained per path.
    pub per_path_message_cap: usize,

    /// Diagnostic messages longer than this many lines are truncated.
    pub max_message_lines: usize,

    /// Number of ranked services reported when no explicit list is given.
    pub top_services: usize,

    /// Maximum per-service pipelines in flight at once.
    pub max_concurrent_services: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_secs: 10,
            per_path_failure_cap: 10,
            per_path_message_cap: 4,
            max_message_lines: 10,
            top_services: 25,
            max_concurrent_services: 4,
        }
    }
}

/// Timeout configuration for collaborator calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single collaborator call in seconds.
    pub query_secs: u64,

    /// Deadline for one service's whole pipeline in seconds.
    pub service_secs: u64,

    /// Deadline for an inbound HTTP request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            query_secs: 30,
            service_secs: 120,
            request_secs: 900,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

/// Snapshot cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one JSON document per date plus the pointer record.
    pub dir: String,

    /// Keep a process-local read-through copy of snapshots.
    pub read_through: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: "./report-cache".to_string(),
            read_through: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ReportConfig = toml::from_str(
            r#"
            [correlation]
            window_secs = 15

            [cache]
            dir = "/var/lib/rollup"
            "#,
        )
        .unwrap();

        assert_eq!(config.correlation.window_secs, 15);
        assert_eq!(config.correlation.per_path_failure_cap, 10);
        assert_eq!(config.correlation.per_path_message_cap, 4);
        assert_eq!(config.cache.dir, "/var/lib/rollup");
        assert!(config.cache.read_through);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
    }

    #[test]
    fn test_default_tracker_disabled() {
        let config = ReportConfig::default();
        assert!(!config.issue_tracker.enabled);
        assert!(config.issue_tracker.jql_template.contains("{service}"));
    }
}
