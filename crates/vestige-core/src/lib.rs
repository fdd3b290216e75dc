//! # vestige-core
//!
//! Core types, traits, and abstractions for the vestige memory engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other vestige crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;

/// Re-export of the pgvector vector type used for embeddings.
pub use pgvector::Vector;
