//! Router for the chat page and API

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde_json::json;

use super::public;
use crate::api::page::Page;
use crate::api::public::ApiError;
use crate::api::state::AppState;

type SharedState = Arc<AppState>;

/// Render the chat page along with the conversation so far
async fn index(State(state): State<SharedState>) -> Result<Html<String>, ApiError> {
    let html = state.templates.render(
        &Page::Chat.to_string(),
        &json!({
            "model": state.model,
            "turns": state.coordinator.log().all(),
        }),
    )?;

    Ok(Html(html))
}

/// Send the user's message to the model and reply with the plain
/// text response
async fn chat_handler(
    State(state): State<SharedState>,
    Form(form): Form<public::ChatForm>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(msg) = form.msg.filter(|m| !m.trim().is_empty()) else {
        return Ok((StatusCode::BAD_REQUEST, "Missing message").into_response());
    };

    let reply = state.coordinator.handle(&msg).await?;

    Ok(reply.into_response())
}

/// Get every turn of the conversation so far
async fn chat_history(State(state): State<SharedState>) -> Json<public::ChatHistoryResponse> {
    Json(public::ChatHistoryResponse {
        turns: state.coordinator.log().all(),
    })
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/get", post(chat_handler))
        .route("/history", get(chat_history))
}
