//! OpenAI-compatible chat completions backend

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::retry::{call_with_retry, RetryPolicy};
use super::{CapabilityError, ModelCapability};
use crate::config::ModelConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Client for any server speaking the `/v1/chat/completions` dialect
pub struct OpenAiCompatibleClient {
    http: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl OpenAiCompatibleClient {
    pub fn new(model: &ModelConfig, api_key: Option<SecretString>) -> Result<Self, CapabilityError> {
        let http = Client::builder()
            .timeout(model.timeout())
            .build()
            .map_err(|e| CapabilityError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: model
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key,
            model: model.model.clone(),
            temperature: model.temperature,
            max_tokens: model.max_output_tokens,
            retry: model.retry_policy(),
            breaker: CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: model.circuit_breaker_failures,
                reset_timeout: model.breaker_reset_timeout(),
            }),
        })
    }

    async fn call_completions(&self, prompt: &str) -> Result<String, CapabilityError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut req = self.http.post(&self.endpoint).json(&request);
        if let Some(ref api_key) = self.api_key {
            req = req.bearer_auth(api_key.expose_secret());
        }

        let response = req.send().await.map_err(CapabilityError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::InvalidResponse("No choices in response".to_string()))
    }
}

#[async_trait]
impl ModelCapability for OpenAiCompatibleClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
        debug!("Chat completion request: model={}, prompt_bytes={}", self.model, prompt.len());
        call_with_retry(&self.model, &self.retry, &self.breaker, || self.call_completions(prompt)).await
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelProvider;
    use mockito::Matcher;

    fn model_config(endpoint: String) -> ModelConfig {
        let mut model = ModelConfig::inference_defaults();
        model.provider = ModelProvider::OpenAi;
        model.model = "gpt-4o".to_string();
        model.endpoint = Some(endpoint);
        model.retry_attempts = 2;
        model.retry_backoff_ms = 1;
        model
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "What is Rust?"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"A language."}}]}"#)
            .create_async()
            .await;

        let client = OpenAiCompatibleClient::new(
            &model_config(format!("{}/v1/chat/completions", server.url())),
            Some(SecretString::new("sk-test".to_string())),
        )
        .unwrap();

        assert_eq!(client.complete("What is Rust?").await.unwrap(), "A language.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_request_fails_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(400)
            .with_body("bad request")
            .expect(1)
            .create_async()
            .await;

        let client = OpenAiCompatibleClient::new(
            &model_config(format!("{}/v1/chat/completions", server.url())),
            None,
        )
        .unwrap();

        let result = client.complete("hi").await;
        assert_eq!(
            result,
            Err(CapabilityError::Upstream {
                status: 400,
                body: "bad request".to_string()
            })
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_breaker_opens_after_repeated_failures() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;

        let mut config = model_config(format!("{}/v1/chat/completions", server.url()));
        config.retry_attempts = 0;
        config.circuit_breaker_failures = 2;
        let client = OpenAiCompatibleClient::new(&config, None).unwrap();

        assert!(client.complete("a").await.is_err());
        assert!(client.complete("b").await.is_err());
        assert_eq!(
            client.complete("c").await,
            Err(CapabilityError::CircuitOpen("gpt-4o".to_string()))
        );
    }
}
