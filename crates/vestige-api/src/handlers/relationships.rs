//! Relationship (scope) endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use vestige_core::RelationshipRepository;

use crate::error::ApiError;
use crate::identity::UserId;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRelationshipRequest {
    pub display_name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// POST /api/v1/relationships
pub async fn create(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<CreateRelationshipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::BadRequest("display_name is required".to_string()));
    }

    let relationship = state
        .db
        .relationships
        .create(user.0, display_name, &req.timezone)
        .await?;

    info!(
        subsystem = "api",
        relationship_id = %relationship.id,
        "Relationship created"
    );
    Ok((StatusCode::CREATED, Json(relationship)))
}

/// GET /api/v1/relationships
pub async fn list(
    State(state): State<AppState>,
    user: UserId,
) -> Result<impl IntoResponse, ApiError> {
    let relationships = state.db.relationships.list_for_user(user.0).await?;
    Ok(Json(relationships))
}
