//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → ReportConfig (validated, immutable)
//!     → sections cloned into the subsystems that own them
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Secrets can come from the environment instead of the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CacheConfig;
pub use schema::CorrelationConfig;
pub use schema::EventStoreConfig;
pub use schema::IssueTrackerConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ReportConfig;
pub use schema::RetryConfig;
pub use schema::TimeoutConfig;
