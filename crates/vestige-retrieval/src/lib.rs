//! # vestige-retrieval
//!
//! Similarity retrieval and context assembly.
//!
//! The assembler turns the latest user turn into a bounded block of
//! relevant memories: embed the query, rank indexed chunks by cosine
//! similarity within the relationship, and render the matches as a
//! private context block for the system prompt.

pub mod assembler;

pub use assembler::{render_context, RetrievalAssembler};
