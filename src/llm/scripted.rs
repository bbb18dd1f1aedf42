//! Deterministic in-process capability for tests
//!
//! Replays canned replies and records every prompt it receives. Compiled only
//! for this crate's unit tests and under the `test-util` feature, which the
//! integration tests enable.

use super::{CapabilityError, ModelCapability};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<String, CapabilityError>>,
    prompts: Vec<String>,
}

pub struct ScriptedCapability {
    name: String,
    fallback: Result<String, CapabilityError>,
    script: Mutex<Script>,
}

impl ScriptedCapability {
    /// Always answers `reply` once the queued replies run out
    pub fn new(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fallback: Ok(reply.into()),
            script: Mutex::new(Script::default()),
        }
    }

    /// Always fails with `error` once the queued replies run out
    pub fn failing(name: impl Into<String>, error: CapabilityError) -> Self {
        Self {
            name: name.into(),
            fallback: Err(error),
            script: Mutex::new(Script::default()),
        }
    }

    /// Queue a one-shot reply ahead of the fallback
    pub fn then(self, reply: Result<String, CapabilityError>) -> Self {
        self.lock().replies.push_back(reply);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn call_count(&self) -> usize {
        self.lock().prompts.len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.lock().prompts.last().cloned()
    }
}

#[async_trait]
impl ModelCapability for ScriptedCapability {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
        let mut script = self.lock();
        script.prompts.push(prompt.to_string());
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
