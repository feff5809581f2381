//! `pushrelay-core` — domain types, configuration and the top-level error
//! shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use types::{
    Attachment, Author, ChatMessage, Conversation, ConversationKind, Mention, NewMessage,
};
