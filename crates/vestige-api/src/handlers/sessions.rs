//! Ritual session endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::UserId;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub relationship_id: Uuid,
    /// Capped by the persona's minute bound and clamped to the allowed
    /// range; omitted means the persona's bound is the duration.
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

/// POST /api/v1/sessions
///
/// Starts a session, replacing any active one for the caller.
pub async fn start(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .sessions
        .start(user.0, req.relationship_id, req.duration_minutes)
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// DELETE /api/v1/sessions
///
/// Ends the caller's active sessions. Idempotent.
pub async fn end(
    State(state): State<AppState>,
    user: UserId,
) -> Result<impl IntoResponse, ApiError> {
    let ended = state.sessions.end(user.0).await?;

    info!(subsystem = "api", ended = ended, "Sessions ended");
    Ok(Json(json!({ "ended": ended })))
}
