//! Context compaction pipeline
//!
//! Estimates how large a conversation history is, summarizes it with a
//! cheap model when it crosses the configured threshold, and answers the
//! current question with the expensive model.

pub mod compaction;
pub mod models;
pub mod observer;
pub mod orchestrator;
pub mod prompt_builder;
pub mod token_estimator;

pub use compaction::{build_compaction_prompt, CompactionEngine, DEFAULT_TOKEN_THRESHOLD};
pub use models::{
    flatten_history, ChatRequest, ChatResponse, ConversationHistory, ConversationTurn, TokenUsage,
};
pub use observer::{ChatPath, NoopObserver, PipelineEvent, PipelineObserver, TracingObserver};
pub use orchestrator::ChatOrchestrator;
pub use prompt_builder::build_prompt;
pub use token_estimator::{CharRatioEstimator, TokenEstimator};
