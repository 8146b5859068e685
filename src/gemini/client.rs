//! Client for Google's generative-language API.
//!
//! A `GeminiSession` behaves like a running chat: every successful
//! call to `send` is remembered and replayed as context on the next
//! call.
use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;

use super::types::{
    Content, ErrorResponse, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
};
use crate::chat::{BoxedChatSession, ChatSession, ModelClient, ModelError, ModelResponse, Turn};

#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_hostname: String,
    api_key: String,
    model: String,
    generation_config: GenerationConfig,
    system_instruction: Option<Content>,
    history_limit: Option<usize>,
}

// Longest slice of an upstream error body kept in an error message
const MAX_ERROR_BODY: usize = 200;

impl GeminiClient {
    pub fn new(
        api_hostname: &str,
        api_key: &str,
        model: &str,
        generation_config: GenerationConfig,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("Missing API key for the generative language API");
        }
        if model.trim().is_empty() {
            bail!("Missing model name for the generative language API");
        }

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            generation_config,
            system_instruction: None,
            history_limit: None,
        })
    }

    /// Sent ahead of the conversation on every request. Blank
    /// instructions are ignored.
    pub fn system_instruction(mut self, instruction: Option<&str>) -> Self {
        self.system_instruction = instruction
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(Content::system);
        self
    }

    /// Only replay the most recent `limit` turns to the model.
    pub fn history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit.map(|l| l.max(1));
        self
    }

    /// Start a session seeded with `history`.
    pub fn session(&self, history: &[Turn]) -> GeminiSession {
        let mut session = GeminiSession {
            client: self.clone(),
            contents: history
                .iter()
                .flat_map(|t| [Content::user(t.user_text()), Content::model(t.bot_text())])
                .collect(),
        };
        session.trim();
        session
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_hostname, self.model
        )
    }
}

impl ModelClient for GeminiClient {
    fn create_session(&self, history: &[Turn]) -> Result<BoxedChatSession> {
        Ok(Box::new(self.session(history)))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

pub struct GeminiSession {
    client: GeminiClient,
    // Alternating user and model contents, oldest first
    contents: Vec<Content>,
}

impl GeminiSession {
    /// Number of completed exchanges this session will replay.
    pub fn history_len(&self) -> usize {
        self.contents.len() / 2
    }

    fn trim(&mut self) {
        if let Some(limit) = self.client.history_limit {
            let max_contents = limit.saturating_mul(2);
            if self.contents.len() > max_contents {
                let excess = self.contents.len() - max_contents;
                self.contents.drain(..excess);
            }
        }
    }
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send(&mut self, text: &str) -> Result<ModelResponse, ModelError> {
        let user_content = Content::user(text);
        let mut contents = self.contents.clone();
        contents.push(user_content.clone());

        let payload = GenerateContentRequest {
            system_instruction: self.client.system_instruction.as_ref(),
            contents: &contents,
            generation_config: &self.client.generation_config,
        };

        tracing::debug!(
            "Sending message to {} with {} prior exchanges",
            self.client.model,
            self.history_len()
        );

        let response = self
            .client
            .http
            .post(self.client.endpoint())
            .header("x-goog-api-key", &self.client.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let resp: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Undecodable response from {}: {}", self.client.model, body);
            ModelError::Decode(e.to_string())
        })?;

        let reply = resp.reply_text();
        match &reply {
            Some(reply) => {
                // Only a complete exchange becomes part of the context
                self.contents.push(user_content);
                self.contents.push(Content::model(reply));
                self.trim();
            }
            None => {
                tracing::warn!(
                    "No text in response from {}. Block reason: {}, finish reason: {}",
                    self.client.model,
                    resp.block_reason().unwrap_or("none"),
                    resp.finish_reason().unwrap_or("none")
                );
            }
        }

        Ok(ModelResponse { text: reply })
    }
}

fn classify_transport_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Network(format!("Request timeout: {}", e))
    } else if e.is_connect() {
        ModelError::Network(format!("Connection failed: {}", e))
    } else {
        ModelError::Network(format!("Request failed: {}", e))
    }
}

fn classify_status(status: StatusCode, body: &str) -> ModelError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            tracing::error!("Unexpected error body with HTTP {}: {}", status, body);
            truncate(body, MAX_ERROR_BODY)
        });

    match status.as_u16() {
        401 | 403 => ModelError::Auth(message),
        429 => ModelError::RateLimit(message),
        500..=599 => ModelError::Server(format!("HTTP {}: {}", status, message)),
        _ => ModelError::InvalidRequest(format!("HTTP {}: {}", status, message)),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const PATH: &str = "/v1beta/models/gemini-1.0-pro:generateContent";

    fn reply_body(text: &str) -> String {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 1, "totalTokenCount": 4}
        })
        .to_string()
    }

    fn generation_config_json() -> serde_json::Value {
        json!({
            "temperature": 0.9,
            "topP": 1.0,
            "topK": 1,
            "maxOutputTokens": 2048
        })
    }

    fn client(url: &str) -> GeminiClient {
        GeminiClient::new(url, "test-key", "gemini-1.0-pro", GenerationConfig::default()).unwrap()
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = GeminiClient::new(
            "https://example.com",
            " ",
            "gemini-1.0-pro",
            GenerationConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = client("https://example.com/");
        assert_eq!(
            client.endpoint(),
            "https://example.com/v1beta/models/gemini-1.0-pro:generateContent"
        );
    }

    #[test]
    fn test_session_seeds_history() {
        let client = client("https://example.com");
        let session = client.session(&[Turn::new("hello", "hi")]);
        assert_eq!(session.history_len(), 1);
        assert_eq!(
            session.contents,
            vec![Content::user("hello"), Content::model("hi")]
        );
    }

    #[tokio::test]
    async fn test_send_basic_response() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::Json(json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": generation_config_json()
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply_body("hi"))
            .create_async()
            .await;

        let mut session = client(&server.url()).session(&[]);
        let resp = session.send("hello").await.unwrap();

        mock.assert_async().await;
        assert_eq!(resp.text.as_deref(), Some("hi"));
        assert_eq!(session.history_len(), 1);
    }

    #[tokio::test]
    async fn test_send_replays_prior_exchanges() {
        let mut server = mockito::Server::new_async().await;

        let first = server
            .mock("POST", PATH)
            .match_body(Matcher::Json(json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": generation_config_json()
            })))
            .with_status(200)
            .with_body(reply_body("hi"))
            .create_async()
            .await;

        let second = server
            .mock("POST", PATH)
            .match_body(Matcher::Json(json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hello"}]},
                    {"role": "model", "parts": [{"text": "hi"}]},
                    {"role": "user", "parts": [{"text": "how are you"}]}
                ],
                "generationConfig": generation_config_json()
            })))
            .with_status(200)
            .with_body(reply_body("fine"))
            .create_async()
            .await;

        let mut session = client(&server.url()).session(&[]);
        session.send("hello").await.unwrap();
        let resp = session.send("how are you").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(resp.text.as_deref(), Some("fine"));
        assert_eq!(session.history_len(), 2);
    }

    #[tokio::test]
    async fn test_send_without_text_keeps_context() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string())
            .create_async()
            .await;

        let mut session = client(&server.url()).session(&[Turn::new("hello", "hi")]);
        let resp = session.send("something blocked").await.unwrap();

        assert_eq!(resp, ModelResponse::empty());
        assert_eq!(session.history_len(), 1);
    }

    #[tokio::test]
    async fn test_send_respects_history_limit() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(reply_body("ok"))
            .expect(3)
            .create_async()
            .await;

        let mut session = client(&server.url())
            .history_limit(Some(2))
            .session(&[]);
        session.send("one").await.unwrap();
        session.send("two").await.unwrap();
        session.send("three").await.unwrap();

        assert_eq!(session.history_len(), 2);
        assert_eq!(session.contents[0], Content::user("two"));
    }

    #[tokio::test]
    async fn test_send_classifies_errors() {
        let cases: [(usize, &str); 5] = [
            (429, "rate"),
            (401, "auth"),
            (403, "auth"),
            (400, "invalid"),
            (503, "server"),
        ];

        for (status, kind) in cases {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("POST", PATH)
                .with_status(status)
                .with_body(
                    json!({"error": {"code": status, "message": "nope", "status": "ERR"}})
                        .to_string(),
                )
                .create_async()
                .await;

            let mut session = client(&server.url()).session(&[]);
            let err = session.send("hello").await.unwrap_err();

            let matches = match kind {
                "rate" => matches!(err, ModelError::RateLimit(_)),
                "auth" => matches!(err, ModelError::Auth(_)),
                "invalid" => matches!(err, ModelError::InvalidRequest(_)),
                "server" => matches!(err, ModelError::Server(_)),
                _ => false,
            };
            assert!(matches, "Unexpected error for status {}: {:?}", status, err);
            assert!(err.to_string().contains("nope"));
            assert_eq!(session.history_len(), 0);
        }
    }

    #[tokio::test]
    async fn test_send_invalid_json_is_decode_error() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let mut session = client(&server.url()).session(&[]);
        let err = session.send("hello").await.unwrap_err();

        assert!(matches!(err, ModelError::Decode(_)));
        assert!(!err.is_transient());
        assert!(!err.to_string().contains("not json"));
    }

    #[tokio::test]
    async fn test_send_truncates_unstructured_error_body() {
        let mut server = mockito::Server::new_async().await;

        let page = format!("<html>{}</html>", "x".repeat(5000));
        let _mock = server
            .mock("POST", PATH)
            .with_status(502)
            .with_body(&page)
            .create_async()
            .await;

        let mut session = client(&server.url()).session(&[]);
        let err = session.send("hello").await.unwrap_err();

        assert!(matches!(err, ModelError::Server(_)));
        assert!(err.to_string().len() < 300);
        assert!(err.to_string().ends_with("..."));
    }

    #[tokio::test]
    async fn test_send_includes_system_instruction() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", PATH)
            .match_body(Matcher::Json(json!({
                "systemInstruction": {"parts": [{"text": "You are a helpful assistant."}]},
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": generation_config_json()
            })))
            .with_status(200)
            .with_body(reply_body("hi"))
            .create_async()
            .await;

        let mut session = client(&server.url())
            .system_instruction(Some("You are a helpful assistant."))
            .session(&[]);
        let resp = session.send("hello").await.unwrap();

        mock.assert_async().await;
        assert_eq!(resp.text.as_deref(), Some("hi"));
        // The instruction is not part of the replayed history
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn test_blank_system_instruction_is_ignored() {
        let client = client("https://example.com").system_instruction(Some("   "));
        assert_eq!(client.system_instruction, None);
    }

    #[test]
    fn test_huge_history_limit_keeps_everything() {
        let session = client("https://example.com")
            .history_limit(Some(usize::MAX))
            .session(&[Turn::new("hello", "hi"), Turn::new("how are you", "fine")]);
        assert_eq!(session.history_len(), 2);
    }

    #[tokio::test]
    async fn test_send_connection_refused_is_network_error() {
        // Nothing listens on port 9 locally
        let mut session = client("http://127.0.0.1:9").session(&[]);
        let err = session.send("hello").await.unwrap_err();

        assert!(matches!(err, ModelError::Network(_)));
        assert!(err.is_transient());
    }
}
