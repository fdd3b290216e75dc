//! Persona repository.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use vestige_core::{
    clamp_session_minutes, Persona, PersonaRepository, Result, UpsertPersonaRequest,
};

/// PostgreSQL persona repository.
pub struct PgPersonaRepository {
    pool: PgPool,
}

impl PgPersonaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonaRepository for PgPersonaRepository {
    async fn upsert(&self, req: UpsertPersonaRequest) -> Result<Persona> {
        let max_minutes = clamp_session_minutes(req.max_minutes) as i32;

        let persona = sqlx::query_as::<_, Persona>(
            r#"INSERT INTO persona
               (user_id, relationship_id, name, tone, description, boundaries,
                topics_allow, topics_block, max_minutes, farewell_style,
                system_prompt, language_code, tts_enabled, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                       COALESCE($10, 'gentle'), $11, COALESCE($12, 'en'), $13, now())
               ON CONFLICT (relationship_id) DO UPDATE SET
                   name = EXCLUDED.name,
                   tone = EXCLUDED.tone,
                   description = EXCLUDED.description,
                   boundaries = EXCLUDED.boundaries,
                   topics_allow = EXCLUDED.topics_allow,
                   topics_block = EXCLUDED.topics_block,
                   max_minutes = EXCLUDED.max_minutes,
                   farewell_style = EXCLUDED.farewell_style,
                   system_prompt = EXCLUDED.system_prompt,
                   language_code = EXCLUDED.language_code,
                   tts_enabled = EXCLUDED.tts_enabled,
                   updated_at = now()
               RETURNING id, user_id, relationship_id, name, tone, description,
                         boundaries, topics_allow, topics_block, max_minutes,
                         farewell_style, system_prompt, language_code,
                         tts_enabled, updated_at"#,
        )
        .bind(req.user_id)
        .bind(req.relationship_id)
        .bind(&req.name)
        .bind(&req.tone)
        .bind(&req.description)
        .bind(&req.boundaries)
        .bind(&req.topics_allow)
        .bind(&req.topics_block)
        .bind(max_minutes)
        .bind(&req.farewell_style)
        .bind(&req.system_prompt)
        .bind(&req.language_code)
        .bind(req.tts_enabled)
        .fetch_one(&self.pool)
        .await?;

        info!(
            subsystem = "database",
            relationship_id = %persona.relationship_id,
            persona = %persona.name,
            "Persona upserted"
        );
        Ok(persona)
    }

    async fn get_for_relationship(
        &self,
        user_id: Uuid,
        relationship_id: Uuid,
    ) -> Result<Option<Persona>> {
        let persona = sqlx::query_as::<_, Persona>(
            r#"SELECT id, user_id, relationship_id, name, tone, description,
                      boundaries, topics_allow, topics_block, max_minutes,
                      farewell_style, system_prompt, language_code,
                      tts_enabled, updated_at
               FROM persona
               WHERE relationship_id = $1 AND user_id = $2"#,
        )
        .bind(relationship_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(persona)
    }
}
