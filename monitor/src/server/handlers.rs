//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use openapi_server::models::{
    ErrorResponse, ForceResponse, HealthResponse, InfoResponse, MetricsResponse,
};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use crate::server::state::ServerState;
use crate::telemetry::collect_system;
use crate::utils::{version_info, SERVICE_NAME};

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: version_info().version,
    })
}

/// Configuration handler
pub async fn info_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(InfoResponse {
        options: state.options.clone(),
    })
}

/// Metrics handler
pub async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(MetricsResponse {
        options: state.options.clone(),
        stats: state.stats.snapshot(),
        system: collect_system(),
    })
}

/// Ask the monitor to check the repository now.
///
/// Requests arriving while a check is already pending are folded into it.
pub async fn force_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    match state.force_tx.try_send(()) {
        Ok(()) => {
            info!("Repository check requested");
            (
                StatusCode::OK,
                Json(ForceResponse {
                    success: true,
                    queued: true,
                    message: "Repository check queued".to_string(),
                }),
            )
                .into_response()
        }
        Err(TrySendError::Full(())) => (
            StatusCode::OK,
            Json(ForceResponse {
                success: true,
                queued: false,
                message: "A repository check is already pending".to_string(),
            }),
        )
            .into_response(),
        Err(TrySendError::Closed(())) => {
            warn!("Repository check requested but the monitor is not running");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "unavailable".to_string(),
                    message: "Monitor is not running".to_string(),
                }),
            )
                .into_response()
        }
    }
}
