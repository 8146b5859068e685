//! The seam between the turn coordinator and whichever model provider
//! answers the messages.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use super::models::Turn;

/// What came back from the model for a single message. `text` is
/// `None` when the provider answered without any text, for example
/// when the reply was blocked.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelResponse {
    pub text: Option<String>,
}

impl ModelResponse {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }
}

/// Failures talking to the model provider, classified so callers can
/// decide whether trying again makes sense.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("rate limited: {0}")]
    RateLimit(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ModelError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit(_) | Self::Server(_)
        )
    }
}

/// A stateful conversation with the model. Each call to `send`
/// continues from every successful call before it.
#[async_trait]
pub trait ChatSession: Send {
    async fn send(&mut self, text: &str) -> Result<ModelResponse, ModelError>;
}

pub type BoxedChatSession = Box<dyn ChatSession + Send + 'static>;

/// A model provider that can start conversations.
pub trait ModelClient: Send + Sync {
    /// Start a session that already knows about `history`.
    fn create_session(&self, history: &[Turn]) -> Result<BoxedChatSession>;

    /// Name of the model answering, used for display and logging.
    fn model(&self) -> &str;
}
