//! Request middleware

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use openapi_server::models::ErrorResponse;
use tracing::debug;

use crate::server::state::ServerState;
use crate::utils::{bearer_token, generate_uuid};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reject requests without a bearer token known to the ledger
pub async fn require_auth(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    let authorized = match token {
        Some(token) => state.ledger.validate_credential(token).await,
        None => false,
    };

    if !authorized {
        debug!("Unauthorized request to {}", request.uri().path());
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized".to_string(),
                message: "Invalid authorization.".to_string(),
            }),
        )
            .into_response();
    }

    next.run(request).await
}

/// Count the request and tag the response with a request id and server name
pub async fn track_request(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let bytes_in = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);
    state.stats.record_request(&route, bytes_in);

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&generate_uuid()) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    if !state.name.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&state.name) {
            headers.insert(header::SERVER, value);
        }
    }

    response
}
