//! Centralized default constants for the vestige system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// CHUNKING
// =============================================================================

/// Soft maximum characters per memory chunk. A single paragraph longer than
/// this is emitted whole, so the bound is a target, not a guarantee.
pub const CHUNK_MAX_CHARS: usize = 900;

/// Divisor for the cheap token-count estimate (chars / 4, rounded up).
pub const TOKEN_ESTIMATE_DIVISOR: usize = 4;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name.
pub const EMBED_MODEL: &str = "text-embedding-3-small";

/// Default embedding vector dimension for text-embedding-3-small.
pub const EMBED_DIMENSION: usize = 1536;

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Number of memory chunks retrieved per query.
pub const RETRIEVAL_K: i64 = 6;

/// Maximum query length in characters before embedding. Overlong queries
/// keep their trailing portion (most recent conversation content).
pub const QUERY_MAX_CHARS: usize = 4000;

// =============================================================================
// SESSIONS
// =============================================================================

/// Minimum ritual session length in minutes.
pub const SESSION_MIN_MINUTES: i64 = 5;

/// Maximum ritual session length in minutes.
pub const SESSION_MAX_MINUTES: i64 = 240;

/// Default persona session length in minutes.
pub const SESSION_DEFAULT_MINUTES: i64 = 60;

// =============================================================================
// GENERATION
// =============================================================================

/// Default completion model name.
pub const GEN_MODEL: &str = "gpt-4o-mini";

/// Default sampling temperature for ritual conversations.
pub const GEN_TEMPERATURE: f32 = 0.7;

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for streaming generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Maximum request body size in bytes (32 MB, bounds artifact uploads).
pub const MAX_BODY_SIZE_BYTES: usize = 32 * 1024 * 1024;

// =============================================================================
// INDEXING
// =============================================================================

/// Capacity of the index worker submission channel.
pub const INDEX_QUEUE_CAPACITY: usize = 64;
