//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → collaborators → snapshot store → ReportService → listener
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     Ctrl+C or broadcast → stop accepting → drain in-flight requests → exit
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
