//! API routes module

pub mod chat;

use std::sync::Arc;

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<AppState>;

/// Create the combined router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Chat page and turn handling
        .merge(chat::router())
}
