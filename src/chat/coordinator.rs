use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use super::client::{BoxedChatSession, ChatSession, ModelClient, ModelError, ModelResponse};
use super::models::{ConversationLog, Turn};

/// Reply recorded and returned when the model answers without any
/// text.
pub const FALLBACK_REPLY: &str = "no response text available";

#[derive(Clone, Debug)]
pub struct CoordinatorOptions {
    /// How long a single call to the model may take
    pub timeout: Duration,
    /// How many times a transient failure is retried before giving up
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each attempt after
    pub retry_backoff: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Runs one turn of the conversation end to end: send the user's
/// message to the model session, pull out the reply, and record the
/// turn in the log.
///
/// The session is stateful and order sensitive so only one turn is
/// ever in flight. Concurrent callers wait for the turn ahead of them
/// to finish.
///
/// Use `TurnCoordinator::initialize` to construct a valid
/// `TurnCoordinator`.
pub struct TurnCoordinator {
    session: Mutex<BoxedChatSession>,
    log: ConversationLog,
    options: CoordinatorOptions,
}

impl TurnCoordinator {
    /// Start the model session from whatever is already in `log`. A
    /// failure here means nothing can be served.
    pub fn initialize(
        client: &dyn ModelClient,
        log: ConversationLog,
        options: CoordinatorOptions,
    ) -> Result<Self> {
        let session = client
            .create_session(&log.all())
            .with_context(|| format!("Failed to start chat session with {}", client.model()))?;

        tracing::debug!(
            "Chat session started with {} using {} prior turns",
            client.model(),
            log.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            log,
            options,
        })
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Send `input_text` to the model and return its reply. The turn
    /// is only recorded once a reply is in hand so a failure leaves
    /// the log untouched.
    pub async fn handle(&self, input_text: &str) -> Result<String, ModelError> {
        // Held until the turn is appended so the order of sends
        // always matches the order of the log
        let mut session = self.session.lock().await;

        let response = self.send(&mut session, input_text).await?;
        let reply = match response.text {
            Some(text) => text,
            None => {
                tracing::warn!("Model response had no text, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        };

        self.log.append(Turn::new(input_text, &reply));
        tracing::debug!("Turn complete. Conversation has {} turns", self.log.len());

        Ok(reply)
    }

    async fn send(
        &self,
        session: &mut BoxedChatSession,
        text: &str,
    ) -> Result<ModelResponse, ModelError> {
        let CoordinatorOptions {
            timeout,
            max_retries,
            retry_backoff,
        } = self.options;
        let mut attempt = 0;

        loop {
            let result = tokio::time::timeout(timeout, session.send(text))
                .await
                .unwrap_or(Err(ModelError::Timeout(timeout)));

            match result {
                Err(e) if e.is_transient() && attempt < max_retries => {
                    let delay = retry_delay(retry_backoff, attempt);
                    attempt += 1;
                    tracing::warn!(
                        "Model request failed: {}. Retrying in {:?} ({}/{})",
                        e,
                        delay,
                        attempt,
                        max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!("Model request failed: {}", e);
                    return Err(e);
                }
                Ok(response) => return Ok(response),
            }
        }
    }
}

// Exponential backoff: base, 2x base, 4x base, ...
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}
