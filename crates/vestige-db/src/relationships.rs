//! Relationship (scope) repository.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use vestige_core::{Relationship, RelationshipRepository, Result};

/// PostgreSQL relationship repository.
pub struct PgRelationshipRepository {
    pool: PgPool,
}

impl PgRelationshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationshipRepository for PgRelationshipRepository {
    async fn create(
        &self,
        user_id: Uuid,
        display_name: &str,
        timezone: &str,
    ) -> Result<Relationship> {
        let relationship = sqlx::query_as::<_, Relationship>(
            r#"INSERT INTO relationship (user_id, display_name, timezone)
               VALUES ($1, $2, $3)
               RETURNING id, user_id, display_name, timezone, created_at"#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(timezone)
        .fetch_one(&self.pool)
        .await?;

        info!(
            subsystem = "database",
            relationship_id = %relationship.id,
            "Relationship created"
        );
        Ok(relationship)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Relationship>> {
        let relationships = sqlx::query_as::<_, Relationship>(
            r#"SELECT id, user_id, display_name, timezone, created_at
               FROM relationship
               WHERE user_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(relationships)
    }
}
