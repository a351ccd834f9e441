//! HTTP surface: health, metrics and the reports API.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use podmortem_core::ForensicReport;
use podmortem_store::Storage;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::metrics::DaemonMetrics;

const DEFAULT_LIMIT: usize = 200;
const MAX_LIMIT: usize = 1000;

/// Shared state behind the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Report backend for the reports endpoints.
    pub store: Arc<dyn Storage>,
    /// Metrics registry served at `/metrics`.
    pub metrics: DaemonMetrics,
    /// Bearer token required on the reports endpoints; empty disables
    /// auth.
    pub token: String,
    /// Allow full report bodies via `?full=true`.
    pub allow_full: bool,
    /// Expose the reports endpoints at all.
    pub reports_enabled: bool,
}

/// Builds the daemon router.
#[must_use]
pub fn build_router(state: ApiState) -> Router {
    let reports_enabled = state.reports_enabled;

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics));

    if reports_enabled {
        router = router
            .route("/reports", get(list_reports))
            .route("/reports/{id}", get(get_report));
    }

    router
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Compact view of a report for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Report id.
    pub id: String,
    /// Namespace of the crashed pod.
    pub namespace: String,
    /// Pod name.
    pub pod_name: String,
    /// Container name.
    pub container: String,
    /// Crash reason.
    pub reason: String,
    /// When the report was collected.
    pub collected_at: DateTime<Utc>,
    /// Number of partial-collection warnings.
    pub warnings: usize,
    /// Whether current-incarnation logs were captured.
    pub has_logs: bool,
    /// Whether prior-incarnation logs were captured.
    pub has_previous_logs: bool,
    /// Whether cluster events were captured.
    pub has_events: bool,
}

impl From<&ForensicReport> for ReportSummary {
    fn from(report: &ForensicReport) -> Self {
        Self {
            id: report.id.clone(),
            namespace: report.crash.namespace.clone(),
            pod_name: report.crash.pod_name.clone(),
            container: report.crash.container_name.clone(),
            reason: report.crash.reason.clone(),
            collected_at: report.collected_at,
            warnings: report.warnings.len(),
            has_logs: report.has_logs(),
            has_previous_logs: report.has_previous_logs(),
            has_events: report.has_events(),
        }
    }
}

#[derive(Serialize)]
struct ListResponse {
    items: Vec<ReportSummary>,
    total: usize,
}

async fn health() -> &'static str {
    "OK"
}

async fn ready() -> &'static str {
    "Ready"
}

async fn metrics(State(state): State<Arc<ApiState>>) -> Response {
    (
        [(header::CONTENT_TYPE, DaemonMetrics::content_type())],
        state.metrics.encode(),
    )
        .into_response()
}

async fn list_reports(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let limit = parse_query_int(&params, "limit", DEFAULT_LIMIT as i64);
    let limit = if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        (limit as usize).min(MAX_LIMIT)
    };
    let offset = parse_query_int(&params, "offset", 0).max(0) as usize;

    let mut reports = match state.store.list() {
        Ok(reports) => reports,
        Err(e) => {
            error!(error = %e, "failed to list reports");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to list reports").into_response();
        }
    };

    reports.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));

    let total = reports.len();
    let items: Vec<ReportSummary> = reports
        .iter()
        .skip(offset)
        .take(limit)
        .map(ReportSummary::from)
        .collect();

    Json(ListResponse { items, total }).into_response()
}

async fn get_report(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let id = id.trim();
    if id.is_empty() || id.contains('/') {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Ok(report) = state.store.load(id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let full = params
        .get("full")
        .map(|value| {
            let value = value.trim();
            value.eq_ignore_ascii_case("true") || value == "1"
        })
        .unwrap_or(false);

    if full && !state.allow_full {
        return StatusCode::FORBIDDEN.into_response();
    }

    if full {
        Json(report).into_response()
    } else {
        Json(ReportSummary::from(&report)).into_response()
    }
}

fn authorized(state: &ApiState, headers: &HeaderMap) -> bool {
    let token = state.token.trim();
    if token.is_empty() {
        return true;
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|presented| presented == token)
}

fn parse_query_int(params: &HashMap<String, String>, key: &str, default: i64) -> i64 {
    params
        .get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
