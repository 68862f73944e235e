//! Filter expressions for the logical query shapes.
//!
//! The expressions are assembled from configured fragments and handed to the
//! event store verbatim; nothing here parses or validates the query language.
//! Each shape renames its output fields to the names in [`super::fields`].

use crate::config::EventStoreConfig;
use crate::sources::{EventQuery, QueryKind};
use crate::time::{TimeRange, TIMESTAMP_FORMAT};

/// Which request/diagnostic events a per-service search is scoped to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceFilter {
    pub service_id: String,
    pub env_type: String,
    pub tier: String,
}

impl ServiceFilter {
    pub fn new(service_id: impl Into<String>, env_type: impl Into<String>, tier: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            env_type: env_type.into(),
            tier: tier.into(),
        }
    }

    fn terms(&self) -> String {
        let mut terms = Vec::new();
        if !self.service_id.is_empty() {
            terms.push(format!("aem_service={}", self.service_id));
        }
        if !self.env_type.is_empty() {
            terms.push(format!("aem_envType={}", self.env_type));
        }
        if !self.tier.is_empty() {
            terms.push(format!("aem_tier={}", self.tier));
        }
        terms.join(" ")
    }
}

/// Builds [`EventQuery`] values for every shape the core consumes.
#[derive(Debug, Clone)]
pub struct QueryShapes {
    config: EventStoreConfig,
}

impl QueryShapes {
    pub fn new(config: EventStoreConfig) -> Self {
        Self { config }
    }

    /// Filter for a specific service, using the configured env/tier.
    pub fn service_filter(&self, service_id: &str) -> ServiceFilter {
        ServiceFilter::new(service_id, &self.config.env_type, &self.config.tier)
    }

    fn fleet_base(&self) -> String {
        let fleet = ServiceFilter::new("", &self.config.env_type, &self.config.tier);
        join(&[&self.config.index, &self.config.access_filter, &fleet.terms()])
    }

    /// (a) failing services ranked by count, with program name.
    pub fn ranked_services(&self, range: TimeRange) -> EventQuery {
        let filter = format!(
            "{} {} | {} | fillnull program_name value=\"\" \
             | stats count as error_count by aem_service, program_name \
             | rename aem_service as service | sort - error_count",
            self.fleet_base(),
            self.config.failure_condition,
            self.config.program_lookup,
        );
        EventQuery { kind: QueryKind::RankedServices, filter, range }
    }

    /// (b) the most recent `per_path_cap` failure timestamps for each path.
    pub fn path_failures(&self, service: &ServiceFilter, range: TimeRange, per_path_cap: usize) -> EventQuery {
        let filter = format!(
            "{} {} | sort 0 - _time | streamstats count as rank by path \
             | where rank <= {} | eval failure_time=strftime(_time, \"{}\") \
             | table path, failure_time",
            join(&[&self.config.index, &self.config.access_filter, &service.terms()]),
            self.config.failure_condition,
            per_path_cap,
            TIMESTAMP_FORMAT,
        );
        EventQuery { kind: QueryKind::PathFailures, filter, range }
    }

    /// (c) every diagnostic event for the service over the whole range.
    pub fn diagnostics(&self, service: &ServiceFilter, range: TimeRange) -> EventQuery {
        let filter = format!(
            "{} | sort 0 _time | eval event_time=strftime(_time, \"{}\") | table event_time, msg",
            join(&[&self.config.index, &service.terms(), &self.config.diagnostic_filter]),
            TIMESTAMP_FORMAT,
        );
        EventQuery { kind: QueryKind::Diagnostics, filter, range }
    }

    /// Total submissions (successful or not) for one service.
    pub fn submission_total(&self, service: &ServiceFilter, range: TimeRange) -> EventQuery {
        let filter = format!(
            "{} | stats count as total",
            join(&[&self.config.index, &self.config.access_filter, &service.terms()]),
        );
        EventQuery { kind: QueryKind::SubmissionTotal, filter, range }
    }

    /// Per-day totals and failures across the fleet.
    pub fn daily_counts(&self, range: TimeRange) -> EventQuery {
        let filter = format!(
            "{} | eval day=strftime(_time, \"%Y-%m-%d\") \
             | eval is_failure=if({},1,0) \
             | stats count as total, sum(is_failure) as failed by day | sort day",
            self.fleet_base(),
            self.config.failure_condition,
        );
        EventQuery { kind: QueryKind::DailyCounts, filter, range }
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
