//! Threshold-gated history compaction
//!
//! Short histories are forwarded as-is. Once the estimated size crosses the
//! configured threshold, the whole history is summarized by the compactor
//! model using a fixed instruction template.

use super::models::{flatten_history, ConversationTurn};
use super::observer::{NoopObserver, PipelineEvent, PipelineObserver};
use super::token_estimator::TokenEstimator;
use crate::llm::{CapabilityError, ModelCapability};
use std::sync::Arc;

/// Default compaction trigger, in estimated tokens
pub const DEFAULT_TOKEN_THRESHOLD: usize = 2000;

const COMPACTION_INSTRUCTIONS: &str = "\
Summarize the following conversation history into a concise context summary.
Preserve: key facts, decisions, user preferences, and any unresolved questions.
Discard: greetings, filler, repetition, and pleasantries.
Output only the summary, no preamble.";

/// Wrap a flattened history in the compaction instructions
pub fn build_compaction_prompt(history: &[ConversationTurn]) -> String {
    format!(
        "{}\n\n---\n{}\n---\n",
        COMPACTION_INSTRUCTIONS,
        flatten_history(history)
    )
}

/// Strict comparison: a history exactly at the threshold is left alone
pub fn exceeds_threshold(estimated_tokens: usize, threshold: usize) -> bool {
    estimated_tokens > threshold
}

pub struct CompactionEngine {
    compactor: Arc<dyn ModelCapability>,
    estimator: Arc<dyn TokenEstimator>,
    token_threshold: usize,
    observer: Arc<dyn PipelineObserver>,
}

impl CompactionEngine {
    pub fn new(
        compactor: Arc<dyn ModelCapability>,
        estimator: Arc<dyn TokenEstimator>,
        token_threshold: usize,
    ) -> Self {
        Self {
            compactor,
            estimator,
            token_threshold,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn token_threshold(&self) -> usize {
        self.token_threshold
    }

    pub fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        &self.estimator
    }

    /// Estimated tokens across the history's turn contents
    pub fn estimate_history_tokens(&self, history: &[ConversationTurn]) -> usize {
        self.estimator.estimate_history(history)
    }

    pub fn should_compact(&self, history: &[ConversationTurn]) -> bool {
        let estimated_tokens = self.estimate_history_tokens(history);
        let compact = exceeds_threshold(estimated_tokens, self.token_threshold);

        self.observer.on_event(&PipelineEvent::HistoryMeasured {
            turns: history.len(),
            estimated_tokens,
            threshold: self.token_threshold,
            compact,
        });

        compact
    }

    /// Summarize the history with the compactor model.
    ///
    /// The model output is returned verbatim, empty or not.
    pub async fn compact(&self, history: &[ConversationTurn]) -> Result<String, CapabilityError> {
        let prompt = build_compaction_prompt(history);
        let summary = self.compactor.complete(&prompt).await?;

        self.observer.on_event(&PipelineEvent::Compacted {
            turns: history.len(),
            input_tokens: self.estimate_history_tokens(history),
            output_tokens: self.estimator.estimate(&summary),
        });

        Ok(summary)
    }
}
