//! HTTP surface subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout layers)
//!     → handlers.rs (parse query/body, call ReportService)
//!     → JSON response (404 for cache misses, 400 for bad input)
//! ```

pub mod handlers;
pub mod server;

pub use server::{build_router, AppState, HttpServer, X_REQUEST_ID};
