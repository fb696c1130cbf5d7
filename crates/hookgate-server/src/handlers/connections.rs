//! Connection management endpoints
//!
//! `POST /connections/{connectionId}` pushes data to a live client and
//! `GET /connections/{connectionId}` describes it.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hookgate_gateway::{push, PushError, PushRequest};
use serde_json::Value;

use crate::state::AppState;

/// Push data to a connection
///
/// The target is the `connectionId` in the body. The path segment is only
/// compared against it for logging.
pub async fn push_handler(
    State(state): State<Arc<AppState>>,
    Path(path_id): Path<String>,
    body: Bytes,
) -> Response {
    let request = match parse_push_request(&body) {
        Some(request) => request,
        None => return push_error_response(PushError::InvalidRequest),
    };

    if let Some(body_id) = request.connection_id.as_deref() {
        if body_id != path_id {
            tracing::warn!(
                path_id = %path_id,
                body_id = %body_id,
                "Path connection ID differs from body; using body"
            );
        }
    }

    match push(&state.registry, request).await {
        Ok(()) => (StatusCode::OK, "Message sent").into_response(),
        Err(e) => push_error_response(e),
    }
}

/// Describe a live connection
pub async fn get_connection_handler(
    State(state): State<Arc<AppState>>,
    Path(connection_id): Path<String>,
) -> Response {
    match state.registry.lookup(&connection_id) {
        Some(handle) => Json(handle.info().await).into_response(),
        None => push_error_response(PushError::Gone(connection_id)),
    }
}

/// Anything that is not a JSON object counts as an invalid request
fn parse_push_request(body: &[u8]) -> Option<PushRequest> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        _ => None,
    }
}

fn push_error_response(error: PushError) -> Response {
    let status =
        StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match &error {
        PushError::SendFailed(_) => tracing::error!("Push failed: {}", error),
        _ => tracing::debug!("Push rejected: {}", error),
    }
    (status, error.to_string()).into_response()
}
