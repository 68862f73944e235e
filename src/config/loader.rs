//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ReportConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file, then apply env overrides.
pub fn load_config(path: &Path) -> Result<ReportConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: ReportConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus env overrides, for running without a config file.
pub fn load_default() -> Result<ReportConfig, ConfigError> {
    let mut config = ReportConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay secrets and endpoints from the environment.
///
/// `lookup` is injected so tests don't touch the process environment.
pub fn apply_env_overrides<F>(config: &mut ReportConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let set = |target: &mut String, key: &str| {
        if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
            *target = value;
        }
    };

    set(&mut config.event_store.base_url, "EVENT_STORE_URL");
    set(&mut config.event_store.username, "EVENT_STORE_USERNAME");
    set(&mut config.event_store.password, "EVENT_STORE_PASSWORD");
    set(&mut config.issue_tracker.base_url, "ISSUE_TRACKER_URL");
    set(&mut config.issue_tracker.bearer_token, "ISSUE_TRACKER_TOKEN");
    set(&mut config.issue_tracker.username, "ISSUE_TRACKER_USER");
    set(&mut config.issue_tracker.api_token, "ISSUE_TRACKER_API_TOKEN");
    set(&mut config.cache.dir, "REPORT_CACHE_DIR");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_env_overrides_replace_secrets() {
        let env: HashMap<&str, &str> = [
            ("EVENT_STORE_PASSWORD", "s3cret"),
            ("REPORT_CACHE_DIR", "/tmp/rollups"),
            ("ISSUE_TRACKER_TOKEN", ""),
        ]
        .into_iter()
        .collect();

        let mut config = ReportConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.event_store.password, "s3cret");
        assert_eq!(config.cache.dir, "/tmp/rollups");
        // Empty values never clobber configured ones.
        assert!(config.issue_tracker.bearer_token.is_empty());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[correlation]\nper_path_failure_cap = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors[0].field, "correlation.per_path_failure_cap");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[correlation\nwindow_secs = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
