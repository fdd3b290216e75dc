//! OpenAI-compatible backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use vestige_core::{
    defaults, ChatMessage, CompletionBackend, EmbeddingBackend, Error, Result, TokenStream, Vector,
};

use super::streaming::parse_sse_stream;
use super::types::*;

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for embeddings.
    pub embed_model: String,
    /// Model to use for chat completion.
    pub gen_model: String,
    /// Expected embedding dimension.
    pub embed_dimension: usize,
    /// Sampling temperature for completions.
    pub temperature: f32,
    /// Embedding request timeout in seconds.
    pub embed_timeout_secs: u64,
    /// Completion request timeout in seconds. Generous, covers the whole
    /// streamed reply.
    pub gen_timeout_secs: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            embed_model: defaults::EMBED_MODEL.to_string(),
            gen_model: defaults::GEN_MODEL.to_string(),
            embed_dimension: defaults::EMBED_DIMENSION,
            temperature: defaults::GEN_TEMPERATURE,
            embed_timeout_secs: defaults::EMBED_TIMEOUT_SECS,
            gen_timeout_secs: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

/// OpenAI-compatible embedding and completion backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        // Per-request timeouts are set at call sites; the client itself has
        // none so streams can outlive the embedding deadline.
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            "Initializing OpenAI backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        let config = OpenAIConfig {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            embed_model: std::env::var("OPENAI_EMBED_MODEL")
                .unwrap_or_else(|_| defaults::EMBED_MODEL.to_string()),
            gen_model: std::env::var("OPENAI_GEN_MODEL")
                .unwrap_or_else(|_| defaults::GEN_MODEL.to_string()),
            embed_dimension: std::env::var("OPENAI_EMBED_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::EMBED_DIMENSION),
            temperature: std::env::var("OPENAI_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::GEN_TEMPERATURE),
            embed_timeout_secs: std::env::var("OPENAI_EMBED_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::EMBED_TIMEOUT_SECS),
            gen_timeout_secs: std::env::var("OPENAI_GEN_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::GEN_TIMEOUT_SECS),
        };

        Self::new(config)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a POST request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(
            subsystem = "inference",
            input_count = texts.len(),
            model = %self.config.embed_model,
            "Embedding texts"
        );

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
            encoding_format: Some("float".to_string()),
        };

        let response = self
            .build_request("/embeddings")
            .timeout(Duration::from_secs(self.config.embed_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: OpenAIErrorResponse = response
                .json()
                .await
                .unwrap_or_else(|_| OpenAIErrorResponse::unknown());
            return Err(Error::Embedding(format!(
                "OpenAI returned {}: {}",
                status, body.error.message
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        // Sort by index to ensure correct ordering
        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        let vectors: Vec<Vector> = data
            .into_iter()
            .map(|d| Vector::from(d.embedding))
            .collect();

        debug!(
            subsystem = "inference",
            input_count = vectors.len(),
            "Generated embeddings"
        );
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl CompletionBackend for OpenAIBackend {
    async fn stream_chat(&self, system: &str, messages: &[ChatMessage]) -> Result<TokenStream> {
        debug!(
            subsystem = "inference",
            model = %self.config.gen_model,
            message_count = messages.len(),
            system_len = system.len(),
            "Opening chat completion stream"
        );

        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            wire_messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        wire_messages.extend_from_slice(messages);

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages: wire_messages,
            temperature: Some(self.config.temperature),
            stream: true,
        };

        let response = self
            .build_request("/chat/completions")
            .timeout(Duration::from_secs(self.config.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: OpenAIErrorResponse = response
                .json()
                .await
                .unwrap_or_else(|_| OpenAIErrorResponse::unknown());
            return Err(Error::Inference(format!(
                "OpenAI returned {}: {}",
                status, body.error.message
            )));
        }

        Ok(parse_sse_stream(response.bytes_stream()))
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}
