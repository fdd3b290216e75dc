//! Artifact endpoints: encrypted upload, text upload, and owner download.
//!
//! Plaintext only ever exists in request scope. The sealed envelope is what
//! hits the blob store, and the artifact row is inserted before the blob is
//! written so a crashed upload leaves a placeholder path, never a dangling
//! blob reference.

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use vestige_core::{Artifact, ArtifactRepository, CreateArtifactRequest};
use vestige_crypto::CryptoError;
use vestige_db::artifact_blob_path;
use vestige_jobs::is_text_family;

use crate::error::ApiError;
use crate::identity::UserId;
use crate::AppState;

/// POST /api/v1/artifacts (multipart: `relationship_id`, `file`)
pub async fn upload(
    State(state): State<AppState>,
    user: UserId,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut relationship_id: Option<Uuid> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("relationship_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("invalid relationship_id: {}", e)))?;
                let id = Uuid::parse_str(text.trim())
                    .map_err(|_| ApiError::BadRequest("invalid relationship_id".to_string()))?;
                relationship_id = Some(id);
            }
            Some("file") => {
                let name = field
                    .file_name()
                    .unwrap_or("upload.bin")
                    .to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file: {}", e)))?;
                file = Some((name, mime, data.to_vec()));
            }
            _ => {}
        }
    }

    let relationship_id = relationship_id
        .ok_or_else(|| ApiError::BadRequest("relationship_id is required".to_string()))?;
    let (name, mime, data) =
        file.ok_or_else(|| ApiError::BadRequest("file is required".to_string()))?;

    let artifact = store_artifact(&state, user.0, relationship_id, &name, &mime, &data).await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

#[derive(Debug, Deserialize)]
pub struct UploadTextRequest {
    pub relationship_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
}

/// POST /api/v1/artifacts/text
pub async fn upload_text(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<UploadTextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content is required".to_string()));
    }

    let name = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("note.txt")
        .to_string();

    let artifact = store_artifact(
        &state,
        user.0,
        req.relationship_id,
        &name,
        "text/plain; charset=utf-8",
        req.content.as_bytes(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// GET /api/v1/artifacts/:id/download
pub async fn download(
    State(state): State<AppState>,
    user: UserId,
    Path(artifact_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let artifact = state.db.artifacts.fetch_owned(artifact_id, user.0).await?;
    let envelope = state.blobs.read(&artifact.storage_path).await?;
    let plaintext = vestige_crypto::open(&state.key, &envelope).map_err(|e| match e {
        CryptoError::Truncated(_) | CryptoError::Authentication => {
            ApiError::Internal("artifact blob failed integrity check".to_string())
        }
        other => ApiError::Internal(other.to_string()),
    })?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        artifact.original_name.replace('"', "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, artifact.original_mime.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        plaintext,
    )
        .into_response())
}

/// Seal, insert, store, finalize, and (for text) queue for indexing.
async fn store_artifact(
    state: &AppState,
    user_id: Uuid,
    relationship_id: Uuid,
    name: &str,
    mime: &str,
    plaintext: &[u8],
) -> Result<Artifact, ApiError> {
    let envelope = vestige_crypto::seal(&state.key, plaintext)
        .map_err(|e| ApiError::Internal(format!("encryption failed: {}", e)))?;

    let mut artifact = state
        .db
        .artifacts
        .insert(CreateArtifactRequest {
            user_id,
            relationship_id,
            original_mime: mime.to_string(),
            original_name: name.to_string(),
            size_bytes: envelope.len() as i64,
        })
        .await?;

    let path = artifact_blob_path(user_id, relationship_id, artifact.id);
    state.blobs.write(&path, &envelope).await?;
    state.db.artifacts.finalize_path(artifact.id, &path).await?;
    artifact.storage_path = path;

    info!(
        subsystem = "api",
        artifact_id = %artifact.id,
        relationship_id = %relationship_id,
        mime = %artifact.original_mime,
        size_bytes = artifact.size_bytes,
        "Artifact stored"
    );

    if is_text_family(&artifact.original_mime) {
        // Indexing is best-effort here; a full queue never fails the upload.
        if let Err(e) = state.index_queue.enqueue(artifact.id).await {
            warn!(
                subsystem = "api",
                artifact_id = %artifact.id,
                error_msg = %e,
                "Failed to queue artifact for indexing"
            );
        }
    }

    Ok(artifact)
}
