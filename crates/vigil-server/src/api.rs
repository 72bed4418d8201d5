pub mod ws;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use vigil_common::types::MetricPoint;

/// Uniform response envelope.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 0 on success.
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "empty_batch" => 1104,
        "storage_error" => 1501,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
    engine_enabled: bool,
}

pub async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: (Utc::now() - state.start_time).num_seconds(),
            engine_enabled: state.engine_enabled,
        },
    )
}

#[derive(Serialize)]
struct IngestResponse {
    accepted: usize,
}

/// Stores a batch of metric points for later evaluation.
pub async fn ingest_metrics(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(points): Json<Vec<MetricPoint>>,
) -> impl IntoResponse {
    if points.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "empty_batch",
            "metric batch is empty",
        );
    }
    if let Some(bad) = points
        .iter()
        .find(|p| p.metric_name.trim().is_empty() || !p.value.is_finite())
    {
        let msg = format!(
            "invalid point: metric_name='{}' value={}",
            bad.metric_name, bad.value
        );
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &msg);
    }

    match state.metrics.record(&points).await {
        Ok(()) => success_response(
            StatusCode::OK,
            &trace_id,
            IngestResponse {
                accepted: points.len(),
            },
        ),
        Err(e) => {
            tracing::error!(trace_id = %trace_id.0, error = %e, "Failed to record metric points");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "failed to record metric points",
            )
        }
    }
}
