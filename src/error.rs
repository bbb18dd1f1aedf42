//! Crate-level error type

use crate::llm::CapabilityError;

/// Errors raised while configuring or running the service
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model capability error: {0}")]
    Capability(#[from] CapabilityError),
}

impl From<config::ConfigError> for ContextError {
    fn from(e: config::ConfigError) -> Self {
        ContextError::Configuration(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
