//! Wire types for the HTTP API

use crate::context::{ChatRequest, ConversationTurn};
use serde::{Deserialize, Serialize};

/// Machine-readable error codes
pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const UPSTREAM_UNAVAILABLE: &str = "UPSTREAM_UNAVAILABLE";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Error body returned on every non-2xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// `POST /api/chat` and `POST /api/chat-raw` body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
    /// Absent and `null` both mean "no prior turns"
    #[serde(default)]
    pub history: Option<Vec<ConversationTurn>>,
}

impl From<ChatRequestBody> for ChatRequest {
    fn from(body: ChatRequestBody) -> Self {
        ChatRequest::new(body.message, body.history.unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

impl HealthResponse {
    pub fn up() -> Self {
        Self {
            status: "UP".to_string(),
            service: "context-engine".to_string(),
        }
    }
}
