//! Core traits for vestige abstractions.
//!
//! These traits define the seams between the memory pipeline and its
//! collaborators (relational store, blob store, model providers), enabling
//! pluggable backends and testability.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use pgvector::Vector;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// ARTIFACT REPOSITORY
// =============================================================================

/// Request for creating a new artifact row.
#[derive(Debug, Clone)]
pub struct CreateArtifactRequest {
    pub user_id: Uuid,
    pub relationship_id: Uuid,
    pub original_mime: String,
    pub original_name: String,
    /// Size of the sealed envelope in bytes.
    pub size_bytes: i64,
}

/// Repository for artifact metadata.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Insert a new artifact with a placeholder storage path.
    async fn insert(&self, req: CreateArtifactRequest) -> Result<Artifact>;

    /// Attach the final blob path once the encrypted upload completes.
    /// The only mutation an artifact ever sees.
    async fn finalize_path(&self, id: Uuid, storage_path: &str) -> Result<()>;

    /// Fetch an artifact without an ownership check. Reserved for the
    /// internal indexing path behind the shared-secret trust boundary.
    async fn fetch(&self, id: Uuid) -> Result<Artifact>;

    /// Fetch an artifact, failing with `ArtifactNotFound` when it does not
    /// exist or is not owned by `user_id`.
    async fn fetch_owned(&self, id: Uuid, user_id: Uuid) -> Result<Artifact>;
}

// =============================================================================
// CHUNK REPOSITORY
// =============================================================================

/// Repository for memory chunk storage and similarity ranking.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Replace the full chunk set for an artifact in a single transaction.
    ///
    /// A concurrent reader observes either the complete old set or the
    /// complete new set, never a mix. Passing an empty `chunks` clears the
    /// artifact's index.
    async fn replace_for_artifact(
        &self,
        artifact: &Artifact,
        chunks: Vec<NewMemoryChunk>,
    ) -> Result<usize>;

    /// Rank the top-`k` chunks within a relationship by cosine similarity
    /// to the query vector, descending, ties broken by chunk id.
    async fn rank_by_similarity(
        &self,
        relationship_id: Uuid,
        query: &Vector,
        k: i64,
    ) -> Result<Vec<RetrievalMatch>>;
}

// =============================================================================
// PERSONA / RELATIONSHIP REPOSITORIES
// =============================================================================

/// Request for creating or updating a persona. Upsert is keyed by
/// `relationship_id` (one persona per scope).
#[derive(Debug, Clone)]
pub struct UpsertPersonaRequest {
    pub user_id: Uuid,
    pub relationship_id: Uuid,
    pub name: String,
    pub tone: Option<String>,
    pub description: Option<String>,
    pub boundaries: Option<String>,
    pub topics_allow: Vec<String>,
    pub topics_block: Vec<String>,
    /// Clamped to [5, 240] before storage.
    pub max_minutes: i64,
    pub farewell_style: Option<String>,
    pub system_prompt: Option<String>,
    pub language_code: Option<String>,
    pub tts_enabled: bool,
}

/// Repository for persona records.
#[async_trait]
pub trait PersonaRepository: Send + Sync {
    /// Create or update the persona for a relationship.
    async fn upsert(&self, req: UpsertPersonaRequest) -> Result<Persona>;

    /// Fetch the persona for a relationship owned by `user_id`.
    async fn get_for_relationship(
        &self,
        user_id: Uuid,
        relationship_id: Uuid,
    ) -> Result<Option<Persona>>;
}

/// Repository for relationship (scope) records.
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Create a new relationship for the given owner.
    async fn create(
        &self,
        user_id: Uuid,
        display_name: &str,
        timezone: &str,
    ) -> Result<Relationship>;

    /// List relationships owned by the user.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Relationship>>;
}

// =============================================================================
// SESSION REPOSITORY
// =============================================================================

/// Repository for ritual session rows.
///
/// `start` is the only way to activate a session and always deactivates the
/// owner's prior active sessions in the same transaction, so the at-most-one
/// active session invariant holds under concurrent starts.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Deactivate any active session for the owner, then insert a new
    /// active session ending `minutes` from now. Both steps run in one
    /// transaction; `minutes` is assumed pre-clamped by the caller.
    async fn start(
        &self,
        user_id: Uuid,
        relationship_id: Uuid,
        minutes: i64,
    ) -> Result<RitualSession>;

    /// Fetch a session by id.
    async fn find(&self, session_id: Uuid) -> Result<Option<RitualSession>>;

    /// Idempotently deactivate all active sessions for the owner.
    /// Returns the number of rows deactivated.
    async fn end_all(&self, user_id: Uuid) -> Result<u64>;
}

// =============================================================================
// INFERENCE BACKENDS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input,
    /// order-preserving.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Lazy, finite, non-restartable stream of reply text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Backend for streaming chat completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Open a token stream for the given system instructions and
    /// conversation history. Fragments arrive in model output order.
    async fn stream_chat(&self, system: &str, messages: &[ChatMessage]) -> Result<TokenStream>;

    /// Model name being used.
    fn model_name(&self) -> &str;
}
