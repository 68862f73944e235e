//! Startup orchestration.
//!
//! # Responsibilities
//! - Build collaborators from configuration
//! - Open the snapshot store and wire the report service
//! - Start metrics, bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::cache::{FsStore, KvStore, StoreError};
use crate::config::ReportConfig;
use crate::correlate::aggregator::Collaborators;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::report::ReportService;
use crate::sources::query::QueryShapes;
use crate::sources::{
    EventStore, EventStoreTotals, IssueTracker, NoTracker, SearchClient, SourceError, SubmissionTotals, TrackerClient,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build collaborator client: {0}")]
    Client(#[from] SourceError),

    #[error("failed to open snapshot store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// HTTP-backed collaborators for the configured endpoints.
pub fn build_collaborators(config: &ReportConfig) -> Result<Collaborators, StartupError> {
    let deadline = Duration::from_secs(config.timeouts.query_secs);

    let store: Arc<dyn EventStore> = Arc::new(SearchClient::new(
        config.event_store.clone(),
        config.retries.clone(),
        deadline,
    )?);

    let tracker: Arc<dyn IssueTracker> = if config.issue_tracker.enabled {
        Arc::new(TrackerClient::new(config.issue_tracker.clone(), config.retries.clone(), deadline)?)
    } else {
        tracing::info!("Issue tracker disabled, reports carry no ticket references");
        Arc::new(NoTracker)
    };

    let totals: Arc<dyn SubmissionTotals> = Arc::new(EventStoreTotals::new(
        store.clone(),
        QueryShapes::new(config.event_store.clone()),
    ));

    Ok(Collaborators { store, tracker, totals })
}

/// Wire everything and serve until shutdown.
pub async fn run(config: ReportConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let collaborators = build_collaborators(&config)?;
    let kv: Arc<dyn KvStore> = Arc::new(FsStore::open(&config.cache.dir)?);
    tracing::info!(dir = %config.cache.dir, read_through = config.cache.read_through, "Snapshot store ready");

    let reports = ReportService::from_config(&config, collaborators, kv);
    let server = HttpServer::new(&config, reports);

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    signals::forward_terminate(shutdown.clone());
    server.run(listener, shutdown).await.map_err(StartupError::Serve)
}
