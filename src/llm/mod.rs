//! Model capabilities: "take a prompt, return a completion"
//!
//! The orchestrator talks to both the compactor and the inference backend
//! through [`ModelCapability`]. Which concrete client backs each role is a
//! configuration decision made in [`build_capability`].

pub mod circuit_breaker;
pub mod openai;
pub mod retry;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod vertex;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use openai::OpenAiCompatibleClient;
pub use retry::RetryPolicy;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedCapability;
pub use vertex::VertexModelClient;

use crate::config::{ModelConfig, ModelProvider, VertexConfig};
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

/// A single-operation text completion backend
#[async_trait]
pub trait ModelCapability: Send + Sync {
    /// Model identity, used for logs and metric labels
    fn model_name(&self) -> &str;

    /// Complete a prompt
    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError>;
}

/// Model capability errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Upstream error: status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Circuit breaker is open for {0}")]
    CircuitOpen(String),
}

impl CapabilityError {
    /// Transport failures, timeouts, throttling and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Configuration(_) | Self::InvalidResponse(_) | Self::CircuitOpen(_) => false,
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Build the capability for one pipeline role from configuration
pub fn build_capability(
    model: &ModelConfig,
    vertex: &VertexConfig,
) -> Result<Arc<dyn ModelCapability>, CapabilityError> {
    let capability: Arc<dyn ModelCapability> = match model.provider {
        ModelProvider::Vertex => {
            let token = read_secret_env(&vertex.access_token_env)?;
            Arc::new(VertexModelClient::new(model, vertex, token)?)
        }
        ModelProvider::OpenAi => {
            let api_key = std::env::var(&model.api_key_env)
                .ok()
                .map(SecretString::new);
            Arc::new(OpenAiCompatibleClient::new(model, api_key)?)
        }
    };

    info!(
        "Model capability ready: provider={:?}, model={}",
        model.provider,
        capability.model_name()
    );

    Ok(capability)
}

fn read_secret_env(var: &str) -> Result<SecretString, CapabilityError> {
    std::env::var(var)
        .map(SecretString::new)
        .map_err(|_| CapabilityError::Configuration(format!("environment variable {} is not set", var)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CapabilityError::Timeout("t".into()).is_retryable());
        assert!(CapabilityError::Request("r".into()).is_retryable());
        assert!(CapabilityError::Upstream { status: 503, body: String::new() }.is_retryable());
        assert!(CapabilityError::Upstream { status: 429, body: String::new() }.is_retryable());
        assert!(!CapabilityError::Upstream { status: 400, body: String::new() }.is_retryable());
        assert!(!CapabilityError::InvalidResponse("x".into()).is_retryable());
        assert!(!CapabilityError::CircuitOpen("m".into()).is_retryable());
    }

    #[test]
    fn test_vertex_requires_access_token() {
        let model = ModelConfig::inference_defaults();
        let vertex = VertexConfig {
            project_id: "demo".to_string(),
            access_token_env: "CONTEXT_ENGINE_TEST_UNSET_TOKEN".to_string(),
            ..Default::default()
        };
        let result = build_capability(&model, &vertex);
        assert!(matches!(result, Err(CapabilityError::Configuration(_))));
    }

    #[test]
    fn test_openai_capability_from_config() {
        let mut model = ModelConfig::compactor_defaults();
        model.provider = ModelProvider::OpenAi;
        model.model = "gpt-4o-mini".to_string();
        model.endpoint = Some("http://localhost:11434/v1/chat/completions".to_string());

        let capability = build_capability(&model, &VertexConfig::default()).unwrap();
        assert_eq!(capability.model_name(), "gpt-4o-mini");
    }
}
