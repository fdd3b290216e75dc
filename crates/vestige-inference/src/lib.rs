//! # vestige-inference
//!
//! Embedding and streaming completion backends for vestige.
//!
//! The OpenAI-compatible backend covers both concerns: batch embeddings for
//! the indexing pipeline and SSE token streams for ritual conversations.
//! The mock backends are deterministic and always compiled so downstream
//! crates can exercise the full pipeline without a live endpoint.

pub mod mock;
pub mod openai;

pub use mock::{MockCompletionBackend, MockEmbeddingBackend};
pub use openai::{OpenAIBackend, OpenAIConfig};

// Re-export the backend traits alongside their implementations.
pub use vestige_core::{CompletionBackend, EmbeddingBackend, TokenStream};
