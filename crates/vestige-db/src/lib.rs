//! # vestige-db
//!
//! PostgreSQL + pgvector storage layer for vestige.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for artifacts, chunks, personas,
//!   relationships, and ritual sessions
//! - Paragraph chunking for embedding generation
//! - Blob storage for sealed artifact envelopes
//!
//! ## Example
//!
//! ```rust,ignore
//! use vestige_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/vestige").await?;
//!     db.migrate().await?;
//!
//!     let relationships = db.relationships.list_for_user(user_id).await?;
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod blob_store;
pub mod chunking;
pub mod chunks;
pub mod personas;
pub mod pool;
pub mod relationships;
pub mod sessions;

// Re-export core types
pub use vestige_core::*;

pub use artifacts::PgArtifactRepository;
pub use blob_store::{artifact_blob_path, BlobStore, FilesystemBlobStore};
pub use chunking::{ChunkerConfig, ParagraphChunker};
pub use chunks::PgChunkRepository;
pub use personas::PgPersonaRepository;
pub use pool::create_pool;
pub use relationships::PgRelationshipRepository;
pub use sessions::{PgSessionRepository, SessionManager};

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::PgPool,
    /// Artifact metadata repository.
    pub artifacts: PgArtifactRepository,
    /// Memory chunk repository.
    pub chunks: PgChunkRepository,
    /// Persona repository.
    pub personas: PgPersonaRepository,
    /// Relationship repository.
    pub relationships: PgRelationshipRepository,
    /// Ritual session repository.
    pub sessions: PgSessionRepository,
}

impl Database {
    /// Connect with the standard pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = pool::create_pool(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build the repository set on an existing pool.
    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self {
            artifacts: PgArtifactRepository::new(pool.clone()),
            chunks: PgChunkRepository::new(pool.clone()),
            personas: PgPersonaRepository::new(pool.clone()),
            relationships: PgRelationshipRepository::new(pool.clone()),
            sessions: PgSessionRepository::new(pool.clone()),
            pool,
        }
    }

    /// Run embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("migration failed: {}", e)))?;
        Ok(())
    }
}
