//! The core models for keeping a running conversation with an LLM.
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// A single exchange: what the user said and what the model said
/// back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(rename = "user")]
    user_text: String,
    #[serde(rename = "bot")]
    bot_text: String,
}

impl Turn {
    pub fn new(user_text: &str, bot_text: &str) -> Self {
        Self {
            user_text: user_text.to_string(),
            bot_text: bot_text.to_string(),
        }
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn bot_text(&self) -> &str {
        &self.bot_text
    }
}

/// Ordered, in-memory record of every completed turn.
///
/// Cloning a `ConversationLog` gives another handle to the same
/// underlying turns so the log can be shared between the coordinator
/// and anything that wants to read the history. Reads and appends
/// can happen from any thread.
///
/// By default the log is unbounded. Use `ConversationLog::with_limit`
/// to keep only the most recent turns.
#[derive(Clone, Debug, Default)]
pub struct ConversationLog {
    turns: Arc<RwLock<VecDeque<Turn>>>,
    limit: Option<usize>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_turns` turns, dropping the oldest first. A
    /// limit of zero is treated as one.
    pub fn with_limit(max_turns: usize) -> Self {
        Self {
            turns: Arc::default(),
            limit: Some(max_turns.max(1)),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn append(&self, turn: Turn) {
        // A panic while holding the lock can't leave a half written
        // turn behind so the poisoned data is still consistent
        let mut turns = self.turns.write().unwrap_or_else(PoisonError::into_inner);
        turns.push_back(turn);
        if let Some(limit) = self.limit {
            while turns.len() > limit {
                turns.pop_front();
            }
        }
    }

    /// Snapshot of the history in the order the turns completed.
    pub fn all(&self) -> Vec<Turn> {
        self.turns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.turns.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
