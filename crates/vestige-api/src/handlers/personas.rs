//! Persona endpoints. One persona per relationship, written by upsert.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use vestige_core::{defaults, PersonaRepository, UpsertPersonaRequest};

use crate::error::ApiError;
use crate::identity::UserId;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PersonaQuery {
    pub relationship_id: Uuid,
}

/// GET /api/v1/persona?relationship_id=...
pub async fn get(
    State(state): State<AppState>,
    user: UserId,
    Query(query): Query<PersonaQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let persona = state
        .db
        .personas
        .get_for_relationship(user.0, query.relationship_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "persona for relationship {}",
                query.relationship_id
            ))
        })?;

    Ok(Json(persona))
}

#[derive(Debug, Deserialize)]
pub struct UpsertPersonaBody {
    pub relationship_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub boundaries: Option<String>,
    #[serde(default)]
    pub topics_allow: Vec<String>,
    #[serde(default)]
    pub topics_block: Vec<String>,
    #[serde(default = "default_max_minutes")]
    pub max_minutes: i64,
    #[serde(default)]
    pub farewell_style: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub tts_enabled: bool,
}

fn default_max_minutes() -> i64 {
    defaults::SESSION_DEFAULT_MINUTES
}

/// POST /api/v1/persona
pub async fn upsert(
    State(state): State<AppState>,
    user: UserId,
    Json(body): Json<UpsertPersonaBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    let persona = state
        .db
        .personas
        .upsert(UpsertPersonaRequest {
            user_id: user.0,
            relationship_id: body.relationship_id,
            name: body.name.trim().to_string(),
            tone: body.tone,
            description: body.description,
            boundaries: body.boundaries,
            topics_allow: body.topics_allow,
            topics_block: body.topics_block,
            max_minutes: body.max_minutes,
            farewell_style: body.farewell_style,
            system_prompt: body.system_prompt,
            language_code: body.language_code,
            tts_enabled: body.tts_enabled,
        })
        .await?;

    info!(
        subsystem = "api",
        persona_id = %persona.id,
        relationship_id = %persona.relationship_id,
        "Persona upserted"
    );
    Ok(Json(persona))
}
