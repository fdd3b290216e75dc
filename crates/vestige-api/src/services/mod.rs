//! Service layer for the vestige API.

pub mod conversation;

pub use conversation::{ConversationService, ReplyStream};
