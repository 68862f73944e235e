//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (caps > 0, timeouts > 0, window > 0)
//! - Check collaborator settings are usable (URLs parse, templates complete)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ReportConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::ReportConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Ranking search plus every batch of services running to its deadline.
///
/// `None` when the concurrency or timeout settings are themselves invalid.
pub fn worst_case_refresh_secs(config: &ReportConfig) -> Option<u64> {
    let correlation = &config.correlation;
    if correlation.max_concurrent_services == 0 {
        return None;
    }
    let batches = correlation.top_services.div_ceil(correlation.max_concurrent_services) as u64;
    batches
        .checked_mul(config.timeouts.service_secs)?
        .checked_add(config.timeouts.query_secs)
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ReportConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let correlation = &config.correlation;
    if correlation.window_secs == 0 {
        errors.push(ValidationError::new("correlation.window_secs", "must be greater than 0"));
    }
    if correlation.per_path_failure_cap == 0 {
        errors.push(ValidationError::new("correlation.per_path_failure_cap", "must be greater than 0"));
    }
    if correlation.per_path_message_cap == 0 {
        errors.push(ValidationError::new("correlation.per_path_message_cap", "must be greater than 0"));
    }
    if correlation.max_message_lines == 0 {
        errors.push(ValidationError::new("correlation.max_message_lines", "must be greater than 0"));
    }
    if correlation.top_services == 0 {
        errors.push(ValidationError::new("correlation.top_services", "must be greater than 0"));
    }
    if correlation.max_concurrent_services == 0 {
        errors.push(ValidationError::new("correlation.max_concurrent_services", "must be greater than 0"));
    }

    if config.timeouts.query_secs == 0 {
        errors.push(ValidationError::new("timeouts.query_secs", "must be greater than 0"));
    }
    if config.timeouts.service_secs == 0 {
        errors.push(ValidationError::new("timeouts.service_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    } else if let Some(worst) = worst_case_refresh_secs(config) {
        if config.timeouts.request_secs < worst {
            errors.push(ValidationError::new(
                "timeouts.request_secs",
                format!("must cover a full refresh ({}s with the current correlation and timeout settings)", worst),
            ));
        }
    }

    if config.retries.enabled && config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1 when retries are enabled"));
    }

    if let Err(e) = url::Url::parse(&config.event_store.base_url) {
        errors.push(ValidationError::new("event_store.base_url", format!("invalid URL: {}", e)));
    }

    let tracker = &config.issue_tracker;
    if tracker.enabled {
        if let Err(e) = url::Url::parse(&tracker.base_url) {
            errors.push(ValidationError::new("issue_tracker.base_url", format!("invalid URL: {}", e)));
        }
        if !tracker.jql_template.contains("{service}") {
            errors.push(ValidationError::new("issue_tracker.jql_template", "must contain the {service} placeholder"));
        }
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}', expected 'pretty' or 'json'", other),
        )),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
