//! Character-ratio token estimation
//!
//! Token counts here only feed the compaction threshold and the usage
//! report, so a length heuristic is used instead of a real tokenizer.

use super::models::ConversationTurn;

/// Token estimator trait for different estimation strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Sum of `estimate(turn.content)` over every turn
    fn estimate_history(&self, history: &[ConversationTurn]) -> usize {
        history.iter().map(|turn| self.estimate(&turn.content)).sum()
    }
}

/// Fixed characters-per-token estimator (~4 chars per token for English)
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

    /// A ratio of zero is clamped to one.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        // UTF-16 code units, truncating division
        text.encode_utf16().count() / self.chars_per_token
    }
}
