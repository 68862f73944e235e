//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the report handlers
//! - Wire up middleware (tracing, request ID, timeout)
//! - Serve until Ctrl+C or a shutdown broadcast

use std::time::Duration;

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ReportConfig;
use crate::http::handlers;
use crate::lifecycle::{signals, Shutdown};
use crate::report::ReportService;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub reports: ReportService,
}

/// HTTP server exposing the report API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ReportConfig, reports: ReportService) -> Self {
        let state = AppState { reports };
        Self {
            router: build_router(state, Duration::from_secs(config.timeouts.request_secs)),
        }
    }

    /// Run until Ctrl+C or `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signals::wait_for_shutdown(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/report/refresh", post(handlers::refresh))
        .route("/report-refresh", post(handlers::refresh))
        .route("/find-ticket", post(handlers::find_ticket))
        .route("/find-skysi", post(handlers::find_ticket))
        .route("/report-data", get(handlers::report_data))
        .route("/report/week", get(handlers::week))
        .route("/report/dates", get(handlers::dates))
        .route("/daily-stats", get(handlers::daily_stats))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}
