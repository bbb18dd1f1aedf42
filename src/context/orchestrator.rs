//! Two-stage chat orchestration: optional compaction, then inference
//!
//! [`ChatOrchestrator::compacted_chat`] routes long histories through the
//! compactor before answering. [`ChatOrchestrator::raw_chat`] always sends
//! the full history and serves as the A/B baseline; both share the prompt
//! builder and inference model so their usage numbers are comparable.

use super::compaction::CompactionEngine;
use super::models::{flatten_history, ChatRequest, ChatResponse, TokenUsage};
use super::observer::{ChatPath, NoopObserver, PipelineEvent, PipelineObserver};
use super::prompt_builder::build_prompt;
use crate::llm::{CapabilityError, ModelCapability};
use std::sync::Arc;

/// Stateless across calls; share it behind an `Arc`.
pub struct ChatOrchestrator {
    engine: CompactionEngine,
    inference: Arc<dyn ModelCapability>,
    observer: Arc<dyn PipelineObserver>,
}

/// Context block plus the compactor's share of the usage
struct PreparedContext {
    context: String,
    compactor_input_tokens: usize,
    compactor_output_tokens: usize,
    compacted: bool,
}

impl PreparedContext {
    fn raw(request: &ChatRequest) -> Self {
        Self {
            context: flatten_history(&request.history),
            compactor_input_tokens: 0,
            compactor_output_tokens: 0,
            compacted: false,
        }
    }
}

impl ChatOrchestrator {
    pub fn new(engine: CompactionEngine, inference: Arc<dyn ModelCapability>) -> Self {
        Self {
            engine,
            inference,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Route events from both stages to `observer`
    pub fn with_observer(self, observer: Arc<dyn PipelineObserver>) -> Self {
        Self {
            engine: self.engine.with_observer(observer.clone()),
            inference: self.inference,
            observer,
        }
    }

    pub fn engine(&self) -> &CompactionEngine {
        &self.engine
    }

    /// Answer with the history compacted first when it is over the threshold.
    ///
    /// A compactor failure fails the whole request; there is no fallback to
    /// the raw path.
    pub async fn compacted_chat(&self, request: &ChatRequest) -> Result<ChatResponse, CapabilityError> {
        let prepared = if self.engine.should_compact(&request.history) {
            let compactor_input_tokens = self.engine.estimate_history_tokens(&request.history);
            let context = self.engine.compact(&request.history).await?;
            PreparedContext {
                compactor_output_tokens: self.engine.estimator().estimate(&context),
                compactor_input_tokens,
                context,
                compacted: true,
            }
        } else {
            PreparedContext::raw(request)
        };

        self.answer(ChatPath::Compacted, prepared, &request.message).await
    }

    /// Answer with the full, unsummarized history
    pub async fn raw_chat(&self, request: &ChatRequest) -> Result<ChatResponse, CapabilityError> {
        self.answer(ChatPath::Raw, PreparedContext::raw(request), &request.message)
            .await
    }

    async fn answer(
        &self,
        path: ChatPath,
        prepared: PreparedContext,
        message: &str,
    ) -> Result<ChatResponse, CapabilityError> {
        let estimator = self.engine.estimator();

        let prompt = build_prompt(&prepared.context, message);
        let input_tokens = estimator.estimate(&prompt);

        let answer = self.inference.complete(&prompt).await?;
        let output_tokens = estimator.estimate(&answer);

        self.observer.on_event(&PipelineEvent::Answered {
            path,
            input_tokens,
            output_tokens,
            compacted: prepared.compacted,
        });

        Ok(ChatResponse {
            answer,
            usage: TokenUsage {
                input_tokens,
                output_tokens,
                compactor_input_tokens: prepared.compactor_input_tokens,
                compactor_output_tokens: prepared.compactor_output_tokens,
            },
            compacted: prepared.compacted,
        })
    }
}
