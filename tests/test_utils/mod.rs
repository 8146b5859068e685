//! Test utilities for integration tests
use std::sync::Arc;

use axum::{Router, body::Body};

use gemchat::api::AppState;
use gemchat::api::app;
use gemchat::chat::{ConversationLog, CoordinatorOptions, TurnCoordinator};
use gemchat::gemini::{GeminiClient, GenerationConfig};

pub const MODEL: &str = "gemini-1.0-pro";

pub const GENERATE_PATH: &str = "/v1beta/models/gemini-1.0-pro:generateContent";

/// Creates a test application router whose model client talks to
/// `api_hostname`, usually a `mockito` server.
pub fn test_app(api_hostname: &str) -> Router {
    test_app_with_log(api_hostname, ConversationLog::new())
}

/// Same as `test_app` but with a log that can be inspected by the
/// test afterwards.
pub fn test_app_with_log(api_hostname: &str, log: ConversationLog) -> Router {
    let client = GeminiClient::new(api_hostname, "test-api-key", MODEL, GenerationConfig::default())
        .expect("Failed to create client");
    let coordinator = TurnCoordinator::initialize(&client, log, CoordinatorOptions::default())
        .expect("Failed to initialize coordinator");
    let app_state = AppState::new(coordinator, MODEL).expect("Failed to create app state");
    app(Arc::new(app_state))
}

/// Body of a successful `generateContent` response with `text` as the
/// reply.
pub fn reply_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP",
            "index": 0
        }]
    })
    .to_string()
}

/// Exact request body the client sends for `contents` with the
/// default generation config.
pub fn request_body(contents: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "contents": contents,
        "generationConfig": {
            "temperature": 0.9,
            "topP": 1.0,
            "topK": 1,
            "maxOutputTokens": 2048
        }
    })
}

/// Helper to convert response body to string
pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
