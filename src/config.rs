//! Service configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `CONTEXT_ENGINE__SECTION__KEY` environment variables.

use crate::error::{ContextError, Result};
use crate::llm::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_PREFIX: &str = "CONTEXT_ENGINE";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub compactor: CompactorConfig,
    #[serde(default)]
    pub vertex: VertexConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from `CONTEXT_ENGINE_CONFIG` (or `config.toml`) plus the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(format!("{}_CONFIG", ENV_PREFIX))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(&path)
    }

    /// Load from a TOML file (missing file is fine) plus the environment
    pub fn from_file(path: &str) -> Result<Self> {
        let file = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;
        let env = config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true);

        let mut config = Self::assemble(file, Some(env))?;
        config.apply_platform_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let file = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        let config = Self::assemble(file, None)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the file layer, then the environment (highest priority)
    fn assemble(file: config::Config, env: Option<config::Environment>) -> Result<Self> {
        let mut builder = Self::with_role_defaults(config::Config::builder())?;

        // `token-threshold` is folded in at default priority so that an
        // underscore spelling in the file or the environment still wins
        if let Some(threshold) = dashed_token_threshold(&file)? {
            builder = builder.set_default("compactor.token_threshold", threshold)?;
        }

        builder = builder.add_source(file);
        if let Some(env) = env {
            builder = builder.add_source(env);
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Per-role model defaults; these differ between the two roles so they
    /// cannot live in serde field defaults.
    fn with_role_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let inference = ModelConfig::inference_defaults();
        let compactor = ModelConfig::compactor_defaults();
        Ok(builder
            .set_default("models.inference.model", inference.model)?
            .set_default("models.inference.temperature", inference.temperature as f64)?
            .set_default("models.inference.max_output_tokens", inference.max_output_tokens as i64)?
            .set_default("models.compactor.model", compactor.model)?
            .set_default("models.compactor.temperature", compactor.temperature as f64)?
            .set_default("models.compactor.max_output_tokens", compactor.max_output_tokens as i64)?)
    }

    /// Container platforms hand the listen port in `PORT`
    fn apply_platform_env(&mut self) {
        if let Ok(val) = std::env::var("PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let uses_vertex = [&self.models.inference, &self.models.compactor]
            .iter()
            .any(|m| m.provider == ModelProvider::Vertex);

        if uses_vertex && self.vertex.project_id.is_empty() {
            return Err(ContextError::Configuration(
                "vertex.project_id must be set when a Vertex model is configured".to_string(),
            ));
        }

        for (role, model) in [("inference", &self.models.inference), ("compactor", &self.models.compactor)] {
            if model.timeout_ms == 0 {
                return Err(ContextError::Configuration(format!(
                    "models.{}.timeout_ms must be greater than zero",
                    role
                )));
            }
            if model.model.is_empty() {
                return Err(ContextError::Configuration(format!(
                    "models.{}.model must not be empty",
                    role
                )));
            }
        }

        Ok(())
    }
}

/// The file spelling `compactor.token-threshold`, if present
fn dashed_token_threshold(file: &config::Config) -> Result<Option<i64>> {
    let compactor = match file.get_table("compactor") {
        Ok(table) => table,
        Err(_) => return Ok(None),
    };

    match compactor.get("token-threshold") {
        Some(value) => Ok(Some(value.clone().into_int()?)),
        None => Ok(None),
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_body_bytes() -> usize { 2 * 1024 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Compaction trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactorConfig {
    /// Estimated history tokens above which the compactor runs
    #[serde(default = "default_token_threshold")]
    pub token_threshold: usize,
}

fn default_token_threshold() -> usize { 2000 }

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            token_threshold: default_token_threshold(),
        }
    }
}

/// Google Cloud project settings shared by Vertex-backed models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    /// Environment variable holding the OAuth2 access token
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    /// Overrides `https://{location}-aiplatform.googleapis.com`
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_location() -> String { "us-central1".to_string() }
fn default_access_token_env() -> String { "VERTEX_ACCESS_TOKEN".to_string() }

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: default_location(),
            access_token_env: default_access_token_env(),
            endpoint: None,
        }
    }
}

/// Model backend family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Vertex,
    #[serde(alias = "openai-compatible")]
    OpenAi,
}

/// The two pipeline roles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "ModelConfig::inference_defaults")]
    pub inference: ModelConfig,
    #[serde(default = "ModelConfig::compactor_defaults")]
    pub compactor: ModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            inference: ModelConfig::inference_defaults(),
            compactor: ModelConfig::compactor_defaults(),
        }
    }
}

/// One model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,

    pub model: String,

    pub temperature: f32,

    pub max_output_tokens: u32,

    /// Full URL for OpenAI-compatible servers
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the API key (OpenAI-compatible only)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_breaker_failures")]
    pub circuit_breaker_failures: usize,

    #[serde(default = "default_breaker_reset")]
    pub circuit_breaker_reset_secs: u64,
}

fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_timeout_ms() -> u64 { 60_000 }
fn default_retry_attempts() -> usize { 2 }
fn default_retry_backoff_ms() -> u64 { 200 }
fn default_breaker_failures() -> usize { 5 }
fn default_breaker_reset() -> u64 { 30 }

impl ModelConfig {
    /// High-quality answering model
    pub fn inference_defaults() -> Self {
        Self::with_model("gemini-2.5-pro", 0.3, 2048)
    }

    /// Fast, cheap summarizing model
    pub fn compactor_defaults() -> Self {
        Self::with_model("gemini-2.0-flash", 0.1, 1024)
    }

    fn with_model(model: &str, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            provider: ModelProvider::Vertex,
            model: model.to_string(),
            temperature,
            max_output_tokens,
            endpoint: None,
            api_key_env: default_api_key_env(),
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            circuit_breaker_failures: default_breaker_failures(),
            circuit_breaker_reset_secs: default_breaker_reset(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_attempts: self.retry_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
