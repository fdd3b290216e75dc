//! Structured logging field name constants for vestige.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (matches, chunks) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → index job → sub-calls.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "retrieval", "db", "inference", "jobs", "crypto"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "reindex", "embed_texts", "converse", "start_session"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Artifact UUID being operated on.
pub const ARTIFACT_ID: &str = "artifact_id";

/// Ritual session UUID.
pub const SESSION_ID: &str = "session_id";

/// Relationship (scope) UUID.
pub const RELATIONSHIP_ID: &str = "relationship_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of chunks produced or replaced.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Number of retrieval matches returned.
pub const MATCH_COUNT: &str = "match_count";

/// Number of input texts sent to an embedding model.
pub const INPUT_COUNT: &str = "input_count";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
