//! Streaming chat endpoint.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

use vestige_core::ChatMessage;

use crate::error::ApiError;
use crate::identity::UserId;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatStreamRequest {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

/// POST /api/v1/chat/stream
///
/// Validates the session and streams the reply as plain text fragments.
/// Invalid sessions fail before any byte is written; once streaming has
/// begun, an upstream failure ends the body with a diagnostic fragment.
pub async fn stream(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<ChatStreamRequest>,
) -> Result<Response, ApiError> {
    let reply = state
        .conversation
        .converse(user.0, req.session_id, req.messages)
        .await?;

    let body = Body::from_stream(reply.map(|fragment| Ok::<_, Infallible>(Bytes::from(fragment))));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .map_err(|e| ApiError::Internal(format!("failed to build response: {}", e)))
}
