//! AI chat assistants.
//!
//! Two assistants (workout and nutrition) share one completion client and
//! one transcript table. Model failures degrade to a canned reply.

pub mod chat;
pub mod client;
pub mod prompts;
pub mod types;

pub use chat::{ChatService, TranscriptStore};
pub use client::LlmClient;
pub use types::{AssistantError, AssistantKind, ChatMessage, Reply, ReplySource, Role, Turn};
