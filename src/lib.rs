//! Failure correlation and rollup reporting library.

pub mod cache;
pub mod config;
pub mod correlate;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod report;
pub mod resilience;
pub mod sources;
pub mod time;

pub use config::schema::ReportConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use report::ReportService;
