//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::chat::Turn;

/// Form posted by the chat page. `msg` is optional here so a missing
/// field can be answered with a 400 by the handler.
#[derive(Deserialize)]
pub struct ChatForm {
    pub msg: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    pub turns: Vec<Turn>,
}
