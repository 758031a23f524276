//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::MonitorError;
use crate::server::handlers::{force_handler, health_handler, info_handler, metrics_handler};
use crate::server::middleware::{require_auth, track_request};
use crate::server::state::ServerState;

/// Build the `/v1.0` routes
pub fn router(state: Arc<ServerState>) -> Router {
    let protected = Router::new()
        .route("/info", get(info_handler))
        .route("/metrics", get(metrics_handler))
        .route("/force", get(force_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let v1 = Router::new()
        .route("/health", get(health_handler))
        .merge(protected);

    Router::new()
        .nest("/v1.0", v1)
        .layer(middleware::from_fn_with_state(state.clone(), track_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), MonitorError>>, MonitorError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| MonitorError::ServerError(format!("Unable to bind {}: {}", addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| MonitorError::ServerError(e.to_string()))
    });

    Ok(handle)
}
