use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub open_sessions: usize,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub storage: String,
    pub storage_backend: String,
    pub redis: String,
    pub ai_gateway: String,
}

/// Health check endpoint - public
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let redis_check = async {
        match &state.cache {
            Some(cache) => Some(cache.health_check().await.is_ok()),
            None => None,
        }
    };

    // Check all services in parallel
    let (storage_result, redis_result, ai_result) = tokio::join!(
        state.store.health_check(),
        redis_check,
        state.gateway.health_check(),
    );

    let storage_status = if storage_result.is_ok() { "ok" } else { "error" };
    let redis_status = match redis_result {
        Some(true) => "ok",
        Some(false) => "error",
        None => "disabled",
    };
    let ai_status = if ai_result.is_ok() { "ok" } else { "error" };

    // Storage is critical, the rest only degrade the service
    let status = if storage_result.is_err() {
        "unhealthy"
    } else if ai_result.is_err() || redis_result == Some(false) {
        "degraded"
    } else {
        "healthy"
    };

    let status_code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            open_sessions: state.sessions.len(),
            services: ServiceHealth {
                storage: storage_status.to_string(),
                storage_backend: state.store.backend_name().to_string(),
                redis: redis_status.to_string(),
                ai_gateway: ai_status.to_string(),
            },
        }),
    )
}
