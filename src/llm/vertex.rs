//! Gemini on Google Vertex AI

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::retry::{call_with_retry, RetryPolicy};
use super::{CapabilityError, ModelCapability};
use crate::config::{ModelConfig, VertexConfig};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Vertex AI `generateContent` client for one model.
///
/// Authenticates with an OAuth2 bearer token read at startup.
// TODO: refresh the access token from the GCE metadata server once it nears expiry
pub struct VertexModelClient {
    http: Client,
    url: String,
    access_token: SecretString,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl VertexModelClient {
    pub fn new(
        model: &ModelConfig,
        vertex: &VertexConfig,
        access_token: SecretString,
    ) -> Result<Self, CapabilityError> {
        if vertex.project_id.is_empty() {
            return Err(CapabilityError::Configuration(
                "vertex.project_id is required for Vertex models".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(model.timeout())
            .build()
            .map_err(|e| CapabilityError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            url: Self::endpoint_url(vertex, &model.model),
            access_token,
            model: model.model.clone(),
            temperature: model.temperature,
            max_output_tokens: model.max_output_tokens,
            retry: model.retry_policy(),
            breaker: CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: model.circuit_breaker_failures,
                reset_timeout: model.breaker_reset_timeout(),
            }),
        })
    }

    /// `global` has no regional prefix; an explicit endpoint overrides the host
    fn endpoint_url(vertex: &VertexConfig, model: &str) -> String {
        let base = match &vertex.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None if vertex.location == "global" => "https://aiplatform.googleapis.com".to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", vertex.location),
        };
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            base, vertex.project_id, vertex.location, model
        )
    }

    async fn call_generate(&self, prompt: &str) -> Result<String, CapabilityError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(CapabilityError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CapabilityError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;

        extract_text(parsed)
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GenerateContentResponse) -> Result<String, CapabilityError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| CapabilityError::InvalidResponse("No candidates in response".to_string()))?;

    Ok(candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

#[async_trait]
impl ModelCapability for VertexModelClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
        debug!("Vertex request: model={}, prompt_bytes={}", self.model, prompt.len());
        call_with_retry(&self.model, &self.retry, &self.breaker, || self.call_generate(prompt)).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}
