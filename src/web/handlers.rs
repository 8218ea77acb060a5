//! HTTP request handlers.

use super::{health_path, AppState};
use crate::probe::{
    validate_query, ErrorKind, MonitorError, OpStatus, ProbeResult, TabularReport, ValidationError,
};
use crate::targets::{DriverKind, RegistryError, TargetConfig};

use axum::{
    extract::{rejection::JsonRejection, MatchedPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Index
// ============================================================================

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: &'static str,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct TargetInfo {
    pub name: String,
    pub driver: DriverKind,
    pub database: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<EndpointInfo>,
    pub targets: Vec<TargetInfo>,
}

fn endpoint(path: &str, method: &'static str, description: &str) -> EndpointInfo {
    EndpointInfo {
        path: path.to_string(),
        method,
        description: description.to_string(),
    }
}

pub async fn handle_index(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.monitor.registry();

    let mut endpoints = vec![endpoint("/health", "GET", "Connectivity check for the default database")];
    for target in registry.list() {
        endpoints.push(endpoint(
            &health_path(&target.name),
            "GET",
            &format!("Health check for {} database", target.name),
        ));
    }
    endpoints.push(endpoint("/metrics", "GET", "Version and instance status"));
    endpoints.push(endpoint("/tablespace", "GET", "Tablespace usage information"));
    endpoints.push(endpoint("/sessions", "GET", "Active session information"));
    endpoints.push(endpoint("/custom", "POST", "Run a read-only query (JSON body with 'query')"));

    let targets = registry
        .list()
        .iter()
        .map(|t| TargetInfo {
            name: t.name.clone(),
            driver: t.driver,
            database: t.database_identifier(),
        })
        .collect();

    Json(ServiceInfo {
        service: "Database Monitor",
        version: env!("CARGO_PKG_VERSION"),
        endpoints,
        targets,
    })
}

// ============================================================================
// Errors outside an operation
// ============================================================================

/// Body returned when a request fails before any operation runs.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: OpStatus,
    pub error: String,
    pub error_kind: ErrorKind,
    pub timestamp: DateTime<Utc>,
}

fn error_response(code: StatusCode, err: MonitorError) -> Response {
    let body = ErrorResponse {
        status: OpStatus::Error,
        error: err.to_string(),
        error_kind: err.kind(),
        timestamp: Utc::now(),
    };
    (code, Json(body)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetQuery {
    #[serde(default)]
    pub target: Option<String>,
}

/// Resolve the `?target=` parameter, or the default target.
fn resolve(state: &AppState, query: &TargetQuery) -> Result<TargetConfig, Response> {
    state
        .monitor
        .resolve(query.target.as_deref())
        .cloned()
        .map_err(|e| error_response(StatusCode::NOT_FOUND, e.into()))
}

// ============================================================================
// Health
// ============================================================================

fn probe_response(result: ProbeResult) -> Response {
    let code = if result.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(result)).into_response()
}

pub async fn handle_health(State(state): State<AppState>) -> Response {
    let target = match resolve(&state, &TargetQuery::default()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    probe_response(state.monitor.health(&target).await)
}

/// Serves every `/<target>_health` route through the startup route table.
pub async fn handle_target_health(State(state): State<AppState>, path: MatchedPath) -> Response {
    let resolved = match state.health_routes.target_for(path.as_str()) {
        Some(name) => state.monitor.resolve(Some(name)).cloned(),
        None => Err(RegistryError::UnknownTarget(path.as_str().to_string())),
    };
    let target = match resolved {
        Ok(t) => t,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e.into()),
    };
    probe_response(state.monitor.health(&target).await)
}

// ============================================================================
// Diagnostics
// ============================================================================

fn report_response(report: TabularReport) -> Response {
    let code = if report.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(report)).into_response()
}

pub async fn handle_metrics(State(state): State<AppState>, Query(query): Query<TargetQuery>) -> Response {
    let target = match resolve(&state, &query) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let result = state.monitor.metrics(&target).await;
    let code = match result.status {
        OpStatus::Success => StatusCode::OK,
        OpStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(result)).into_response()
}

pub async fn handle_tablespace(State(state): State<AppState>, Query(query): Query<TargetQuery>) -> Response {
    let target = match resolve(&state, &query) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    report_response(state.monitor.tablespaces(&target).await)
}

pub async fn handle_sessions(State(state): State<AppState>, Query(query): Query<TargetQuery>) -> Response {
    let target = match resolve(&state, &query) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    report_response(state.monitor.sessions(&target).await)
}

// ============================================================================
// Custom queries
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CustomQueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

pub async fn handle_custom(
    State(state): State<AppState>,
    Query(query): Query<TargetQuery>,
    payload: Result<Json<CustomQueryRequest>, JsonRejection>,
) -> Response {
    // A body that is not JSON, or not an object with a string query,
    // counts as no query at all.
    let sql = payload.ok().and_then(|Json(req)| req.query);

    // The query is checked before the target, so a bad request body is
    // reported as such whatever `?target=` names.
    if let Err(e) = validate_query(sql.as_deref()) {
        return validation_response(e);
    }

    let target = match resolve(&state, &query) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match state.monitor.custom_query(&target, sql.as_deref()).await {
        Ok(report) => report_response(report),
        Err(e) => validation_response(e),
    }
}

fn validation_response(e: ValidationError) -> Response {
    let code = match e {
        ValidationError::Empty => StatusCode::BAD_REQUEST,
        ValidationError::NotReadOnly => StatusCode::FORBIDDEN,
    };
    error_response(code, e.into())
}
