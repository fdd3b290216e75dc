//! Internal reindex trigger.
//!
//! Sits behind a shared secret rather than user identity: callers are other
//! services (or operators), and the handler may index any artifact by id.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the internal shared secret.
pub const INTERNAL_INDEX_HEADER: &str = "x-internal-index";

#[derive(Debug, Deserialize)]
pub struct TriggerIndexRequest {
    pub artifact_id: Uuid,
}

/// POST /internal/index
pub async fn trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TriggerIndexRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // No configured secret means the endpoint is disabled outright.
    let Some(expected) = state.internal_index_secret.as_deref() else {
        return Err(ApiError::Forbidden(
            "internal indexing is disabled".to_string(),
        ));
    };

    let provided = headers
        .get(INTERNAL_INDEX_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        return Err(ApiError::Forbidden(
            "invalid internal index credential".to_string(),
        ));
    }

    state.index_queue.enqueue(req.artifact_id).await?;

    info!(
        subsystem = "api",
        artifact_id = %req.artifact_id,
        "Artifact queued for reindex"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "queued": true, "artifact_id": req.artifact_id })),
    ))
}
