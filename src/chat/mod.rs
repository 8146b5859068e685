mod client;
mod coordinator;
mod models;

pub use client::{BoxedChatSession, ChatSession, ModelClient, ModelError, ModelResponse};
pub use coordinator::{CoordinatorOptions, FALLBACK_REPLY, TurnCoordinator};
pub use models::{ConversationLog, Turn};
