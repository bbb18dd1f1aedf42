//! Pipeline events and observers
//!
//! The compaction engine and the orchestrator report what they decided
//! through a [`PipelineObserver`] instead of logging directly, so the
//! decision code stays free of side channels.

use crate::metrics::METRICS;
use tracing::info;

/// Which orchestration path served a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPath {
    Compacted,
    Raw,
}

impl ChatPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatPath::Compacted => "compacted",
            ChatPath::Raw => "raw",
        }
    }
}

/// Structured record of a pipeline step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// History size was compared against the threshold
    HistoryMeasured {
        turns: usize,
        estimated_tokens: usize,
        threshold: usize,
        compact: bool,
    },
    /// The compactor returned a summary
    Compacted {
        turns: usize,
        input_tokens: usize,
        output_tokens: usize,
    },
    /// The inference model answered
    Answered {
        path: ChatPath,
        input_tokens: usize,
        output_tokens: usize,
        compacted: bool,
    },
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Discards every event
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: &PipelineEvent) {}
}

/// Emits `tracing` records and Prometheus samples
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match *event {
            PipelineEvent::HistoryMeasured {
                turns,
                estimated_tokens,
                threshold,
                compact,
            } => {
                info!(
                    turns,
                    estimated_tokens,
                    threshold,
                    compact,
                    "Estimated history tokens: {} (threshold: {})",
                    estimated_tokens,
                    threshold
                );
            }
            PipelineEvent::Compacted {
                turns,
                input_tokens,
                output_tokens,
            } => {
                info!(
                    turns,
                    input_tokens,
                    output_tokens,
                    "Context compacted: {} -> ~{} tokens",
                    input_tokens,
                    output_tokens
                );
                METRICS.record_compaction(input_tokens, output_tokens);
            }
            PipelineEvent::Answered {
                path,
                input_tokens,
                output_tokens,
                compacted,
            } => {
                info!(
                    path = path.as_str(),
                    input_tokens,
                    output_tokens,
                    compacted,
                    "Inference complete"
                );
                METRICS.record_pipeline_tokens(path.as_str(), input_tokens, output_tokens);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every event for later assertions
    #[derive(Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<PipelineEvent>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<PipelineEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl PipelineObserver for RecordingObserver {
        fn on_event(&self, event: &PipelineEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}
