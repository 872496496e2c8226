//! Health check handler

use std::sync::Arc;

use axum::extract::State;
use serde::Serialize;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ok};
use crate::store::Store;

/// Health check response data
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
    pub git_hash: &'static str,
}

/// GET /api/v1/health
///
/// - Healthy: 200 OK + {code: 0, data: {timestamp_ms, git_hash}}
/// - Unhealthy: 503 Service Unavailable + {code: 5001, msg: "unavailable"}
pub async fn health_check<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<HealthResponse> {
    if let Err(e) = state.store().ping().await {
        tracing::error!(error = %e, "[HEALTH] store ping failed");
        return ApiError::service_unavailable("unavailable").into_err();
    }

    ok(HealthResponse {
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        git_hash: env!("GIT_HASH"),
    })
}
