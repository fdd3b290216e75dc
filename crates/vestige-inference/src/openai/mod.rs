//! OpenAI-compatible backend: batch embeddings and streaming chat.

pub mod backend;
pub mod streaming;
pub mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use streaming::parse_sse_stream;
