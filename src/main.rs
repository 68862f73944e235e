//! Failure Rollup Server
//!
//! Correlates request failures with diagnostic events per service and
//! serves daily snapshots and weekly rollups over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                    FAILURE ROLLUP                         │
//!                 │                                                          │
//!   HTTP request  │  ┌─────────┐    ┌─────────────┐    ┌──────────────────┐  │
//!   ──────────────┼─▶│  http   │───▶│   report    │───▶│    correlate     │  │
//!                 │  │handlers │    │  service    │    │ rank → locate →  │  │
//!                 │  └─────────┘    └──────┬──────┘    │ window-correlate │  │
//!                 │                        │           └────────┬─────────┘  │
//!                 │                        ▼                    ▼            │
//!                 │                 ┌─────────────┐    ┌──────────────────┐  │
//!                 │                 │    cache    │    │     sources      │──┼──▶ event store
//!                 │                 │ snapshots + │    │ search, tracker, │──┼──▶ issue tracker
//!                 │                 │ week merge  │    │ totals           │  │
//!                 │                 └─────────────┘    └──────────────────┘  │
//!                 │                                                          │
//!                 │  config · observability · resilience · lifecycle         │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use failure_rollup::config::loader::{load_config, load_default};
use failure_rollup::lifecycle::{startup, Shutdown};
use failure_rollup::observability::logging;

#[derive(Parser)]
#[command(name = "failure-rollup")]
#[command(about = "Failure correlation and rollup report server", long_about = None)]
struct Args {
    /// TOML configuration file; defaults plus environment overrides when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_default()?,
    };

    logging::init(&config.observability);
    tracing::info!("failure-rollup v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        window_secs = config.correlation.window_secs,
        top_services = config.correlation.top_services,
        max_concurrent_services = config.correlation.max_concurrent_services,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
