//! Embedding provider implementations.
//!
//! Implements the core [`EmbeddingProvider`] trait for:
//! - **[`DisabledProvider`]**: errors on use; ingestion stores rows without vectors.
//! - **[`HttpProvider`]**: a hosted embed function taking `{"text"}` and returning `{"embedding"}`.
//! - **[`OpenAIProvider`]**: the OpenAI embeddings API.
//! - **[`OllamaProvider`]**: a local Ollama instance's `/api/embed` endpoint.
//!
//! # Retry Strategy
//!
//! Every network provider makes one attempt by default (`max_retries = 0`).
//! With retries configured:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

pub use support_kb_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;

/// Create the provider named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"http"` | [`HttpProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "http" => Ok(Box::new(HttpProvider::new(config)?)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    fn is_enabled(&self) -> bool {
        false
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Shared HTTP plumbing ============

/// Model name, dimensionality, and request policy shared by the network providers.
struct RequestSettings {
    model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl RequestSettings {
    fn new(config: &EmbeddingConfig, label: &str) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for {} provider", label))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for {} provider", label))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model,
            dims,
            max_retries: config.max_retries,
            client,
        })
    }

    /// Send the request built by `build` until it succeeds, fails with a
    /// client error, or retries run out. Returns the parsed JSON body.
    async fn send_json<F>(&self, label: &str, build: F) -> Result<serde_json::Value>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(provider = label, attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            match build(&self.client).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                        continue;
                    }

                    bail!("{} API error {}: {}", label, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!("{} request failed: {}", label, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
    }

    fn check_dims(&self, vector: Vec<f32>) -> Result<Vec<f32>> {
        if vector.len() != self.dims {
            bail!(
                "Embedding has {} dimensions, expected {} for model {}",
                vector.len(),
                self.dims,
                self.model
            );
        }
        Ok(vector)
    }
}

fn json_to_vec(value: &serde_json::Value, what: &str) -> Result<Vec<f32>> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid {} response: embedding is not an array", what))?;
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid {} response: non-numeric embedding value", what))
        })
        .collect()
}

// ============ HTTP edge-function Provider ============

/// Embedding provider for a hosted embed function.
///
/// Sends `POST {url}` with `{"text": "..."}` and expects
/// `{"embedding": [f32, ...]}`. When `api_key_env` is set, its value is sent
/// both as the `apikey` header and as a bearer token.
pub struct HttpProvider {
    settings: RequestSettings,
    url: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let settings = RequestSettings::new(config, "http")?;
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow!("embedding.url required for http provider"))?;
        let api_key = match &config.api_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .map_err(|_| anyhow!("{} environment variable not set", var))?,
            ),
            None => None,
        };
        Ok(Self {
            settings,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpProvider {
    fn model_name(&self) -> &str {
        &self.settings.model
    }
    fn dims(&self) -> usize {
        self.settings.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "text": text });
        let json = self
            .settings
            .send_json("Embed function", |client| {
                let mut req = client.post(self.url.as_str()).json(&body);
                if let Some(key) = &self.api_key {
                    req = req
                        .header("apikey", key.as_str())
                        .header("Authorization", format!("Bearer {}", key));
                }
                req
            })
            .await?;
        self.settings.check_dims(parse_http_response(&json)?)
    }
}

fn parse_http_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("embedding")
        .ok_or_else(|| anyhow!("Invalid embed function response: missing embedding"))?;
    json_to_vec(embedding, "embed function")
}

// ============ OpenAI Provider ============

/// Embedding provider using `POST https://api.openai.com/v1/embeddings`.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    settings: RequestSettings,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let settings = RequestSettings::new(config, "OpenAI")?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self { settings, api_key })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.settings.model
    }
    fn dims(&self) -> usize {
        self.settings.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.settings.model,
            "input": [text],
        });
        let json = self
            .settings
            .send_json("OpenAI", |client| {
                client
                    .post("https://api.openai.com/v1/embeddings")
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&body)
            })
            .await?;
        self.settings.check_dims(parse_openai_response(&json)?)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let first = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;
    let embedding = first
        .get("embedding")
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
    json_to_vec(embedding, "OpenAI")
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST {url}/api/embed` (default `http://localhost:11434`).
pub struct OllamaProvider {
    settings: RequestSettings,
    url: String,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let settings = RequestSettings::new(config, "Ollama")?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self { settings, url })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.settings.model
    }
    fn dims(&self) -> usize {
        self.settings.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.settings.model,
            "input": [text],
        });
        let endpoint = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json = self
            .settings
            .send_json("Ollama", |client| client.post(endpoint.as_str()).json(&body))
            .await?;
        self.settings.check_dims(parse_ollama_response(&json)?)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;
    json_to_vec(first, "Ollama")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_response() {
        let json = serde_json::json!({ "embedding": [0.5, -0.25, 1.0] });
        assert_eq!(parse_http_response(&json).unwrap(), vec![0.5, -0.25, 1.0]);
        assert!(parse_http_response(&serde_json::json!({ "error": "boom" })).is_err());
    }

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "data": [{ "index": 0, "embedding": [1.0, 2.0] }]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), vec![1.0, 2.0]);
        assert!(parse_openai_response(&serde_json::json!({ "data": [] })).is_err());
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = serde_json::json!({ "embeddings": [[0.0, 3.5]] });
        assert_eq!(parse_ollama_response(&json).unwrap(), vec![0.0, 3.5]);
        let bad = serde_json::json!({ "embeddings": [["x"]] });
        assert!(parse_ollama_response(&bad).is_err());
    }

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert!(!provider.is_enabled());
        assert_eq!(provider.model_name(), "disabled");
        assert!(provider.embed("hello").await.is_err());
    }

    #[test]
    fn test_dims_mismatch_rejected() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            model: Some("nomic-embed-text".to_string()),
            dims: Some(3),
            ..EmbeddingConfig::default()
        };
        let provider = OllamaProvider::new(&config).unwrap();
        assert!(provider.settings.check_dims(vec![1.0, 2.0]).is_err());
        assert_eq!(
            provider.settings.check_dims(vec![1.0, 2.0, 3.0]).unwrap().len(),
            3
        );
    }
}
