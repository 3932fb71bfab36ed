use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::api::state::ApiState;
use crate::error::MatchdayError;
use crate::pipeline::extract_bearer_token;

pub const CRON_TOKEN_HEADER: &str = "x-cron-token";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: i64,
}

/// Token from `x-cron-token`, falling back to `Authorization: Bearer`
fn cron_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CRON_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(extract_bearer_token)
        })
}

/// GET /health -- liveness probe
pub async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_seconds(),
    })
}

/// POST /cron/pipeline -- run every stage once.
///
/// 200 when all stages succeed, 207 when the run completed with failed
/// stages, 401 when the token is missing or wrong.
pub async fn run_pipeline(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let now = (state.clock)();
    match state.orchestrator.invoke(cron_token(&headers), now).await {
        Ok(report) => {
            let status = if report.success {
                StatusCode::OK
            } else {
                StatusCode::MULTI_STATUS
            };
            (status, Json(report)).into_response()
        }
        Err(MatchdayError::Unauthorized(reason)) => {
            warn!(%reason, "Rejected pipeline trigger");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Pipeline trigger failed");
            let status = if e.is_rejection() {
                StatusCode::BAD_REQUEST
            } else if e.is_store_failure() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}
