//! JSON handlers over the [`ReportService`].

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::{WeekLookup, WeeklyRollup};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::report::{RefreshRequest, ReportError};
use crate::sources::TicketRef;

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub friday: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    #[serde(default, alias = "aem_service")]
    pub service_id: String,
}

#[derive(Serialize)]
struct TicketBody<'a> {
    service_id: &'a str,
    ticket: Option<TicketRef>,
}

#[derive(Serialize)]
struct WeekBody<'a> {
    status: &'static str,
    #[serde(flatten)]
    week: &'a WeeklyRollup,
}

fn respond<T: Serialize>(route: &'static str, status: StatusCode, body: T) -> Response {
    metrics::record_http_request(route, status.as_u16());
    (status, Json(body)).into_response()
}

fn error(route: &'static str, status: StatusCode, message: impl Into<String>) -> Response {
    respond(route, status, serde_json::json!({ "error": message.into() }))
}

fn report_error(route: &'static str, e: ReportError) -> Response {
    match e {
        ReportError::NotFound(_) => error(route, StatusCode::NOT_FOUND, e.to_string()),
        ReportError::InvalidRange(_) => error(route, StatusCode::BAD_REQUEST, e.to_string()),
        ReportError::Cache(_) => {
            tracing::error!(route, error = %e, "Report request failed");
            error(route, StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// `None` for an absent or blank parameter, `Err` for a malformed one.
fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("expected YYYY-MM-DD, got '{}'", s)),
    }
}

pub async fn health() -> Response {
    respond(
        "/health",
        StatusCode::OK,
        HealthStatus {
            version: env!("CARGO_PKG_VERSION"),
            status: "ok",
        },
    )
}

/// Body is optional; an empty body refreshes the previous UTC day.
pub async fn refresh(State(state): State<AppState>, body: Bytes) -> Response {
    const ROUTE: &str = "/report/refresh";

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::default()
    } else {
        match serde_json::from_slice::<RefreshRequest>(&body) {
            Ok(request) => request,
            Err(e) => return error(ROUTE, StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)),
        }
    };

    // Detached so the snapshot is still written when the request times out.
    let reports = state.reports.clone();
    let run = tokio::spawn(async move { reports.refresh(request).await });
    match run.await {
        Ok(Ok(snapshot)) => respond(ROUTE, StatusCode::OK, snapshot),
        Ok(Err(e)) => report_error(ROUTE, e),
        Err(e) => {
            tracing::error!(route = ROUTE, error = %e, "Refresh task failed");
            error(ROUTE, StatusCode::INTERNAL_SERVER_ERROR, "refresh task failed")
        }
    }
}

/// Ticket lookup for one service; `aem_service` is accepted as an alias.
pub async fn find_ticket(State(state): State<AppState>, body: Bytes) -> Response {
    const ROUTE: &str = "/find-ticket";

    let request = match serde_json::from_slice::<TicketQuery>(&body) {
        Ok(request) => request,
        Err(e) => return error(ROUTE, StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)),
    };
    let service_id = request.service_id.trim();
    if service_id.is_empty() {
        return error(ROUTE, StatusCode::BAD_REQUEST, "missing service_id");
    }

    let ticket = state.reports.find_ticket(service_id).await;
    respond(ROUTE, StatusCode::OK, TicketBody { service_id, ticket })
}

pub async fn report_data(State(state): State<AppState>, Query(query): Query<DateQuery>) -> Response {
    const ROUTE: &str = "/report-data";

    let date = match parse_date(query.date.as_deref()) {
        Ok(date) => date,
        Err(message) => return error(ROUTE, StatusCode::BAD_REQUEST, message),
    };
    match state.reports.get(date) {
        Ok(snapshot) => respond(ROUTE, StatusCode::OK, snapshot.as_ref()),
        Err(e) => report_error(ROUTE, e),
    }
}

pub async fn week(State(state): State<AppState>, Query(query): Query<WeekQuery>) -> Response {
    const ROUTE: &str = "/report/week";

    let date = match parse_date(query.friday.as_deref()) {
        Ok(date) => date,
        Err(message) => return error(ROUTE, StatusCode::BAD_REQUEST, message),
    };
    match state.reports.get_week(date) {
        Ok(WeekLookup::Merged(week)) => respond(ROUTE, StatusCode::OK, WeekBody { status: "ok", week: &week }),
        Ok(WeekLookup::NoData { start, end }) => respond(
            ROUTE,
            StatusCode::OK,
            serde_json::json!({
                "status": "no_data",
                "start": start,
                "end": end,
                "services": [],
                "dates": [],
                "days_present": 0,
            }),
        ),
        Err(e) => report_error(ROUTE, e),
    }
}

pub async fn dates(State(state): State<AppState>) -> Response {
    const ROUTE: &str = "/report/dates";

    match state.reports.list_dates() {
        Ok(dates) => respond(ROUTE, StatusCode::OK, dates),
        Err(e) => report_error(ROUTE, e),
    }
}

pub async fn daily_stats(State(state): State<AppState>, Query(query): Query<StatsQuery>) -> Response {
    let stats = state.reports.daily_stats(query.days.unwrap_or(0)).await;
    respond("/daily-stats", StatusCode::OK, stats)
}
