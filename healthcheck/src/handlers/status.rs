//! Status endpoint translating the health report into an HTTP response

use crate::{
    error::Result,
    health::{DatabasesCheck, FilesAbsentCheck, HealthCheck, HealthChecker},
    AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::info;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_root))
        .route("/status", get(handle_status))
}

async fn handle_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "app": state.app_name,
        "version": state.version,
        "endpoints": {
            "status": "/status"
        }
    }))
}

/// Assembles the configured checks, runs them, and maps the overall verdict
/// to a status code: healthy is 200, unhealthy is 500. When configuration
/// yields no checks at all, the endpoint answers 200 with an informational
/// payload instead of invoking the checker.
pub async fn handle_status(State(state): State<AppState>) -> Result<Response> {
    info!("GET /status - running health checks");

    let mut checker = HealthChecker::new(build_checks(&state)?)?;
    if checker.is_empty() {
        return Ok((StatusCode::OK, Json("There were no checks.")).into_response());
    }

    let (ok, report) = checker.run_all().await?;

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status_code, Json(report)).into_response())
}

/// The check list is rebuilt from configuration on every request, so each
/// run starts from fresh check state.
fn build_checks(state: &AppState) -> Result<Vec<Box<dyn HealthCheck>>> {
    let status = &state.config.status;
    let mut checks: Vec<Box<dyn HealthCheck>> = Vec::new();

    if status.check_databases && !state.databases.is_empty() {
        checks.push(Box::new(DatabasesCheck::new(state.databases.clone())?));
    }

    if !status.quiesce_files.is_empty() {
        checks.push(Box::new(FilesAbsentCheck::new(
            status.quiesce_files.clone(),
            "quiesce file doesn't exist",
        )?));
    }

    Ok(checks)
}
