//! Context Engine: cross-model context compaction for multi-turn chat
//!
//! A cheap compactor model summarizes conversation history once it grows
//! past a token threshold; an expensive inference model then answers the
//! current question from the compacted context. A raw path that skips
//! compaction is kept alongside for A/B cost comparison.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod telemetry;

pub use error::{ContextError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::api::{build_app, build_app_with, AppState};
    pub use crate::config::{Config, ModelConfig, ModelProvider};
    pub use crate::context::{
        build_prompt, CharRatioEstimator, ChatOrchestrator, ChatRequest, ChatResponse,
        CompactionEngine, ConversationTurn, PipelineObserver, TokenEstimator, TokenUsage,
    };
    pub use crate::error::{ContextError, Result};
    pub use crate::llm::{CapabilityError, ModelCapability};
}
