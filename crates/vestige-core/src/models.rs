//! Core data models for vestige.
//!
//! All persisted entities carry `user_id` (owner) and, where relevant,
//! `relationship_id` (scope). Ownership is exclusive: cross-user access to
//! another owner's rows must fail authorization regardless of discovered ids.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

/// An uploaded piece of content, stored encrypted at rest.
///
/// Immutable after its blob path is finalized; only explicit owner deletion
/// removes it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Artifact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub relationship_id: Uuid,
    /// Blob store path: `{user_id}/{relationship_id}/{id}.enc`.
    /// Holds a placeholder value until the encrypted blob upload completes.
    pub storage_path: String,
    pub original_mime: String,
    pub original_name: String,
    /// Size of the sealed envelope in bytes (not the plaintext size).
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// A chunk row produced by the indexer, before insertion. Chunk sets are
/// replaced as a unit per artifact; rows are only ever read back through
/// similarity ranking.
#[derive(Debug, Clone)]
pub struct NewMemoryChunk {
    pub content: String,
    pub n_tokens: i32,
    pub embedding: Vector,
}

impl NewMemoryChunk {
    /// Build a chunk row from content and its embedding, estimating tokens.
    pub fn new(content: String, embedding: Vector) -> Self {
        let n_tokens = estimate_tokens(&content);
        Self {
            content,
            n_tokens,
            embedding,
        }
    }
}

/// Estimate the token count of a text as ceil(chars / 4).
pub fn estimate_tokens(content: &str) -> i32 {
    content
        .chars()
        .count()
        .div_ceil(defaults::TOKEN_ESTIMATE_DIVISOR) as i32
}

/// The grouping key under which artifacts, chunks, personas, and sessions
/// are partitioned.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Relationship {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

/// Conversational persona bound to one relationship (unique per scope).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Persona {
    pub id: Uuid,
    pub user_id: Uuid,
    pub relationship_id: Uuid,
    pub name: String,
    pub tone: Option<String>,
    pub description: Option<String>,
    pub boundaries: Option<String>,
    pub topics_allow: Vec<String>,
    pub topics_block: Vec<String>,
    /// Session length bound in minutes, clamped to [5, 240] on write.
    pub max_minutes: i32,
    pub farewell_style: String,
    pub system_prompt: Option<String>,
    pub language_code: String,
    pub tts_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl Persona {
    /// Derived system instructions: explicit prompt if set, otherwise a
    /// default built from the persona name.
    pub fn system_instructions(&self) -> String {
        match &self.system_prompt {
            Some(prompt) if !prompt.trim().is_empty() => prompt.clone(),
            _ => format!("You are a caring simulation named {}.", self.name),
        }
    }
}

/// Clamp a requested session duration to the allowed range.
pub fn clamp_session_minutes(minutes: i64) -> i64 {
    minutes.clamp(defaults::SESSION_MIN_MINUTES, defaults::SESSION_MAX_MINUTES)
}

/// A time-boxed conversational session bound to one scope and one owner.
///
/// Invariant: at most one row with `active = true` exists per `user_id` at
/// any instant.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RitualSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub relationship_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
}

impl RitualSession {
    /// Whether the session's wall-clock end time has passed.
    ///
    /// The stored `active` flag may lag behind the clock; validity checks
    /// must always consult this, never a cached answer.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    /// Seconds remaining before expiry, floored at zero.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.ends_at - now).num_seconds().max(0)
    }
}

/// Result of validating a session: the scope to retrieve against and the
/// time budget left for the reply.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub relationship_id: Uuid,
    pub remaining_seconds: i64,
}

/// One retrieval match: chunk content plus cosine similarity to the query.
/// Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalMatch {
    pub content: String,
    pub similarity: f64,
}

/// One turn of a ritual conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "user", "assistant", or "system".
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_clamp_session_minutes() {
        assert_eq!(clamp_session_minutes(1), 5);
        assert_eq!(clamp_session_minutes(5), 5);
        assert_eq!(clamp_session_minutes(60), 60);
        assert_eq!(clamp_session_minutes(240), 240);
        assert_eq!(clamp_session_minutes(10_000), 240);
        assert_eq!(clamp_session_minutes(-3), 5);
    }

    #[test]
    fn test_session_expiry_uses_wall_clock() {
        let now = Utc::now();
        let session = RitualSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            relationship_id: Uuid::new_v4(),
            started_at: now - Duration::minutes(30),
            ends_at: now - Duration::seconds(1),
            active: true, // stale flag; clock wins
        };

        assert!(session.is_expired(now));
        assert_eq!(session.remaining_seconds(now), 0);
    }

    #[test]
    fn test_session_remaining_seconds() {
        let now = Utc::now();
        let session = RitualSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            relationship_id: Uuid::new_v4(),
            started_at: now,
            ends_at: now + Duration::minutes(10),
            active: true,
        };

        let remaining = session.remaining_seconds(now);
        assert!((599..=600).contains(&remaining));
        assert!(!session.is_expired(now));
    }

    #[test]
    fn test_persona_system_instructions_default() {
        let persona = Persona {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            relationship_id: Uuid::new_v4(),
            name: "Ada".to_string(),
            tone: None,
            description: None,
            boundaries: None,
            topics_allow: vec![],
            topics_block: vec![],
            max_minutes: 60,
            farewell_style: "gentle".to_string(),
            system_prompt: None,
            language_code: "en".to_string(),
            tts_enabled: false,
            updated_at: Utc::now(),
        };

        assert_eq!(
            persona.system_instructions(),
            "You are a caring simulation named Ada."
        );
    }

    #[test]
    fn test_persona_system_instructions_explicit() {
        let persona = Persona {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            relationship_id: Uuid::new_v4(),
            name: "Ada".to_string(),
            tone: None,
            description: None,
            boundaries: None,
            topics_allow: vec![],
            topics_block: vec![],
            max_minutes: 60,
            farewell_style: "gentle".to_string(),
            system_prompt: Some("Speak softly.".to_string()),
            language_code: "en".to_string(),
            tts_enabled: false,
            updated_at: Utc::now(),
        };

        assert_eq!(persona.system_instructions(), "Speak softly.");
    }

    #[test]
    fn test_chat_message_constructors() {
        let m = ChatMessage::user("hello");
        assert_eq!(m.role, "user");
        assert_eq!(m.content, "hello");

        let m = ChatMessage::assistant("hi");
        assert_eq!(m.role, "assistant");
    }
}
