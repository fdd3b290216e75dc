//! Ritual session repository and lifecycle manager.
//!
//! The repository owns the at-most-one-active-session invariant at the
//! storage level; [`SessionManager`] layers clamping and wall-clock
//! validation on top and is what handlers talk to.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use vestige_core::{
    clamp_session_minutes, defaults, Error, PersonaRepository, Result, RitualSession,
    SessionRepository, SessionTicket,
};

/// PostgreSQL ritual session repository.
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn start(
        &self,
        user_id: Uuid,
        relationship_id: Uuid,
        minutes: i64,
    ) -> Result<RitualSession> {
        // Deactivate-then-insert in one transaction. The partial unique
        // index on (user_id) WHERE active backstops concurrent starts.
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE ritual_session SET active = false WHERE user_id = $1 AND active")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let session = sqlx::query_as::<_, RitualSession>(
            r#"INSERT INTO ritual_session (user_id, relationship_id, started_at, ends_at, active)
               VALUES ($1, $2, now(), now() + make_interval(mins => $3::int), true)
               RETURNING id, user_id, relationship_id, started_at, ends_at, active"#,
        )
        .bind(user_id)
        .bind(relationship_id)
        .bind(minutes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            subsystem = "database",
            session_id = %session.id,
            relationship_id = %relationship_id,
            minutes = minutes,
            "Ritual session started"
        );
        Ok(session)
    }

    async fn find(&self, session_id: Uuid) -> Result<Option<RitualSession>> {
        let session = sqlx::query_as::<_, RitualSession>(
            r#"SELECT id, user_id, relationship_id, started_at, ends_at, active
               FROM ritual_session WHERE id = $1"#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn end_all(&self, user_id: Uuid) -> Result<u64> {
        let result =
            sqlx::query("UPDATE ritual_session SET active = false WHERE user_id = $1 AND active")
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}

/// Session lifecycle manager.
///
/// Resolves durations against the persona's minute bound, validates
/// sessions against the wall clock, and ends sessions idempotently.
pub struct SessionManager {
    repo: Arc<dyn SessionRepository>,
    personas: Arc<dyn PersonaRepository>,
}

impl SessionManager {
    pub fn new(repo: Arc<dyn SessionRepository>, personas: Arc<dyn PersonaRepository>) -> Self {
        Self { repo, personas }
    }

    /// Start a session, replacing any active one for the owner.
    ///
    /// The relationship's persona sets the minute bound: it is the duration
    /// when the request names none and caps the request when it does.
    /// Without a persona, an omitted duration falls back to the standard
    /// default. The result is clamped to the allowed range either way.
    pub async fn start(
        &self,
        user_id: Uuid,
        relationship_id: Uuid,
        requested_minutes: Option<i64>,
    ) -> Result<RitualSession> {
        let persona_bound = self
            .personas
            .get_for_relationship(user_id, relationship_id)
            .await?
            .map(|p| i64::from(p.max_minutes));

        let minutes = match (requested_minutes, persona_bound) {
            (Some(requested), Some(bound)) => requested.min(bound),
            (Some(requested), None) => requested,
            (None, Some(bound)) => bound,
            (None, None) => defaults::SESSION_DEFAULT_MINUTES,
        };

        self.repo
            .start(user_id, relationship_id, clamp_session_minutes(minutes))
            .await
    }

    /// Validate a session for use by its owner.
    ///
    /// Checks existence, ownership, the active flag, and the wall-clock end
    /// time, in that order. A session found expired here is also marked
    /// inactive so the stored flag catches up with the clock.
    pub async fn validate(&self, session_id: Uuid, user_id: Uuid) -> Result<SessionTicket> {
        let session = self
            .repo
            .find(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;

        // A foreign session looks like a missing one to the caller.
        if session.user_id != user_id {
            return Err(Error::SessionNotFound(session_id));
        }

        if !session.active {
            return Err(Error::SessionEnded(session_id));
        }

        let now = Utc::now();
        if session.is_expired(now) {
            self.repo.end_all(user_id).await?;
            return Err(Error::SessionExpired(session_id));
        }

        Ok(SessionTicket {
            session_id: session.id,
            user_id: session.user_id,
            relationship_id: session.relationship_id,
            remaining_seconds: session.remaining_seconds(now),
        })
    }

    /// End all active sessions for the owner. Idempotent; returns the
    /// number of sessions deactivated.
    pub async fn end(&self, user_id: Uuid) -> Result<u64> {
        self.repo.end_all(user_id).await
    }
}
