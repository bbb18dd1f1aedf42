//! Data models for the compaction pipeline

use serde::{Deserialize, Serialize};

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Free-form speaker label ("user", "assistant", ...)
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Ordered conversation history, oldest turn first
pub type ConversationHistory = Vec<ConversationTurn>;

/// A chat request as seen by the orchestrator.
///
/// The history is always present here; an absent or `null` history on the
/// wire is turned into an empty vector by the API layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub history: ConversationHistory,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, history: ConversationHistory) -> Self {
        Self {
            message: message.into(),
            history,
        }
    }
}

/// Estimated token accounting for one request across both pipeline stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Zero unless the compactor ran
    pub compactor_input_tokens: usize,
    /// Zero unless the compactor ran
    pub compactor_output_tokens: usize,
}

impl TokenUsage {
    /// Sum of all four counters
    pub fn total_tokens(&self) -> usize {
        self.input_tokens
            + self.output_tokens
            + self.compactor_input_tokens
            + self.compactor_output_tokens
    }
}

/// Answer plus usage accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub usage: TokenUsage,
    /// True iff the compaction path was taken
    pub compacted: bool,
}

/// Serialize a history as `role: content` lines, preserving order
pub fn flatten_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}
