//! HTTP request handlers.
//!
//! Handlers stay thin: extract identity and input, call into repositories
//! and services, map domain errors to HTTP via [`ApiError`].
//!
//! [`ApiError`]: crate::error::ApiError

pub mod artifacts;
pub mod chat;
pub mod index_trigger;
pub mod personas;
pub mod relationships;
pub mod sessions;
