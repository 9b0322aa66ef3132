//! HTTP request handlers.

use super::AppState;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::status::HistoryPoint;

// ============================================================================
// API: Status
// ============================================================================

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.aggregator.system_status(Utc::now()) {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            tracing::error!("Failed to compute status: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn handle_service_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.aggregator.current_status(&id, Utc::now()) {
        Ok(Some(status)) => Json(status).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown service" }))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: History
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub service_id: String,
    pub checks: Vec<HistoryPoint>,
}

pub async fn handle_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.aggregator.recent_history(&id, Utc::now()) {
        Ok(checks) => Json(HistoryResponse {
            service_id: id,
            checks,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to load history for {}: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// ============================================================================
// API: Config
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub check_interval: u64,
}

pub async fn handle_get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(ConfigResponse {
        check_interval: state.services.snapshot().check_interval,
    })
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub ok: bool,
    pub message: String,
}

pub async fn handle_reload_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.services.reload() {
        Ok(_) => Json(ReloadResponse {
            ok: true,
            message: "config reloaded".to_string(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Config reload failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReloadResponse {
                    ok: false,
                    message: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

pub async fn handle_api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
