//! Artifact metadata repository.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use vestige_core::{Artifact, ArtifactRepository, CreateArtifactRequest, Error, Result};

/// PostgreSQL artifact repository.
pub struct PgArtifactRepository {
    pool: PgPool,
}

impl PgArtifactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactRepository for PgArtifactRepository {
    async fn insert(&self, req: CreateArtifactRequest) -> Result<Artifact> {
        let artifact = sqlx::query_as::<_, Artifact>(
            r#"INSERT INTO artifact (user_id, relationship_id, original_mime, original_name, size_bytes)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, user_id, relationship_id, storage_path,
                         original_mime, original_name, size_bytes, created_at"#,
        )
        .bind(req.user_id)
        .bind(req.relationship_id)
        .bind(&req.original_mime)
        .bind(&req.original_name)
        .bind(req.size_bytes)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            subsystem = "database",
            artifact_id = %artifact.id,
            mime = %artifact.original_mime,
            size_bytes = artifact.size_bytes,
            "Artifact row inserted"
        );
        Ok(artifact)
    }

    async fn finalize_path(&self, id: Uuid, storage_path: &str) -> Result<()> {
        let result = sqlx::query("UPDATE artifact SET storage_path = $2 WHERE id = $1")
            .bind(id)
            .bind(storage_path)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ArtifactNotFound(id));
        }
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Artifact> {
        sqlx::query_as::<_, Artifact>(
            r#"SELECT id, user_id, relationship_id, storage_path,
                      original_mime, original_name, size_bytes, created_at
               FROM artifact WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::ArtifactNotFound(id))
    }

    async fn fetch_owned(&self, id: Uuid, user_id: Uuid) -> Result<Artifact> {
        // Filtering by owner in the query means a foreign id is
        // indistinguishable from a missing one.
        sqlx::query_as::<_, Artifact>(
            r#"SELECT id, user_id, relationship_id, storage_path,
                      original_mime, original_name, size_bytes, created_at
               FROM artifact WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::ArtifactNotFound(id))
    }
}
