//! Memory chunk storage and similarity ranking.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use vestige_core::{Artifact, ChunkRepository, NewMemoryChunk, Result, RetrievalMatch};

/// PostgreSQL memory chunk repository.
pub struct PgChunkRepository {
    pool: PgPool,
}

impl PgChunkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChunkRepository for PgChunkRepository {
    async fn replace_for_artifact(
        &self,
        artifact: &Artifact,
        chunks: Vec<NewMemoryChunk>,
    ) -> Result<usize> {
        let count = chunks.len();

        // Delete and insert in one transaction so retrieval never sees a
        // mixed or partially written chunk set.
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM mem_chunk WHERE artifact_id = $1")
            .bind(artifact.id)
            .execute(&mut *tx)
            .await?;

        for chunk in &chunks {
            sqlx::query(
                r#"INSERT INTO mem_chunk
                   (user_id, relationship_id, artifact_id, content, n_tokens, embedding)
                   VALUES ($1, $2, $3, $4, $5, $6)"#,
            )
            .bind(artifact.user_id)
            .bind(artifact.relationship_id)
            .bind(artifact.id)
            .bind(&chunk.content)
            .bind(chunk.n_tokens)
            .bind(&chunk.embedding)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            subsystem = "database",
            artifact_id = %artifact.id,
            chunk_count = count,
            "Replaced chunk set for artifact"
        );
        Ok(count)
    }

    async fn rank_by_similarity(
        &self,
        relationship_id: Uuid,
        query: &Vector,
        k: i64,
    ) -> Result<Vec<RetrievalMatch>> {
        // `<=>` is pgvector cosine distance; similarity = 1 - distance.
        // Ties broken by id for reproducible ordering.
        let rows = sqlx::query(
            r#"SELECT content, 1 - (embedding <=> $1) AS similarity
               FROM mem_chunk
               WHERE relationship_id = $2
               ORDER BY embedding <=> $1, id
               LIMIT $3"#,
        )
        .bind(query)
        .bind(relationship_id)
        .bind(k)
        .fetch_all(&self.pool)
        .await?;

        let matches = rows
            .into_iter()
            .map(|row| {
                Ok(RetrievalMatch {
                    content: row.try_get("content")?,
                    similarity: row.try_get("similarity")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "database",
            relationship_id = %relationship_id,
            match_count = matches.len(),
            "Ranked chunks by similarity"
        );
        Ok(matches)
    }
}
