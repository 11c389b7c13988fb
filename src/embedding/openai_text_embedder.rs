//! OpenAI API-based text embedder implementation.
//!
//! Talks to any OpenAI-compatible `/embeddings` endpoint. Transient failures
//! (timeouts, connection errors, `429` and `5xx` responses) are retried at
//! most `max_retries` times; the default is a single retry because embedding
//! calls are billed.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::embedding::text_embedder::{TextEmbedder, check_dimension};
use crate::error::{KioskError, Result};

/// Default OpenAI-compatible base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for [`OpenAITextEmbedder`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIEmbedderConfig {
    /// API key sent as a bearer token.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Requested output dimension. `None` keeps the model's native size.
    pub dimensions: Option<usize>,
    /// Per-request timeout.
    #[serde(with = "crate::hybrid::config::duration_millis")]
    pub timeout: Duration,
    /// Retries for transient failures on top of the first attempt.
    pub max_retries: usize,
}

impl std::fmt::Debug for OpenAIEmbedderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIEmbedderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for OpenAIEmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "text-embedding-3-large".to_string(),
            dimensions: Some(384),
            timeout: Duration::from_secs(2),
            max_retries: 1,
        }
    }
}

impl OpenAIEmbedderConfig {
    /// Longest one embedding call can take: every attempt running into the
    /// request timeout, plus the backoff between attempts.
    pub fn retry_budget(&self) -> Duration {
        let attempts = u32::try_from(self.max_retries.saturating_add(1)).unwrap_or(u32::MAX);
        let backoff: Duration = (1..=self.max_retries)
            .map(OpenAITextEmbedder::retry_backoff)
            .sum();
        self.timeout.saturating_mul(attempts).saturating_add(backoff)
    }
}

/// Request structure for OpenAI Embeddings API.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

/// Response structure from OpenAI Embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// OpenAI API-based text embedder.
pub struct OpenAITextEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    /// Value sent as `dimensions`, if any.
    requested_dimensions: Option<usize>,
    dimension: usize,
    max_retries: usize,
}

impl OpenAITextEmbedder {
    /// Create a new OpenAI embedder.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API key or model is empty, or if
    /// the HTTP client cannot be built.
    pub fn new(config: OpenAIEmbedderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(KioskError::config("missing OpenAI API key"));
        }
        if config.model.trim().is_empty() {
            return Err(KioskError::config("missing OpenAI model name"));
        }
        if config.dimensions == Some(0) {
            return Err(KioskError::config("embedding dimensions must be positive"));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
            .map_err(|e| KioskError::config(format!("invalid OpenAI API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| KioskError::config(format!("failed to build OpenAI HTTP client: {e}")))?;

        let default_dimension = Self::default_dimension(&config.model);
        let dimension = config.dimensions.unwrap_or(default_dimension);
        let requested_dimensions = config.dimensions.filter(|d| *d != default_dimension);

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model,
            requested_dimensions,
            dimension,
            max_retries: config.max_retries,
        })
    }

    /// Native dimension of the known OpenAI models.
    pub fn default_dimension(model: &str) -> usize {
        match model {
            "text-embedding-3-large" => 3072,
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            _ => 1536,
        }
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        Duration::from_millis(250 * attempt as u64)
    }

    /// Issue one request without retrying.
    async fn request_once(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.requested_dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let message = format!("OpenAI API request failed: {e}");
                if e.is_timeout() || e.is_connect() {
                    KioskError::transient_embedding(message)
                } else {
                    KioskError::embedding(message)
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            KioskError::transient_embedding(format!("Failed to read response text: {e}"))
        })?;

        if !status.is_success() {
            let message = format!("OpenAI API error (status {status}): {body}");
            return Err(if Self::should_retry(status) {
                KioskError::transient_embedding(message)
            } else {
                KioskError::embedding(message)
            });
        }

        parse_embedding_response(&body, inputs.len(), self.dimension)
    }
}

/// Decode an embeddings response, restoring input order and checking shape.
fn parse_embedding_response(
    body: &str,
    expected_count: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| KioskError::embedding(format!("Failed to parse OpenAI response: {e}")))?;

    if parsed.data.len() != expected_count {
        return Err(KioskError::embedding(format!(
            "OpenAI returned {} embeddings for {} inputs",
            parsed.data.len(),
            expected_count
        )));
    }

    parsed.data.sort_by_key(|entry| entry.index);
    let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
    for vector in &vectors {
        check_dimension(dimension, vector)?;
    }
    Ok(vectors)
}

#[async_trait]
impl TextEmbedder for OpenAITextEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| KioskError::embedding("No embedding in response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0usize;
        loop {
            match self.request_once(texts).await {
                Ok(vectors) => {
                    debug!(
                        "embedded {} texts with {} (attempt {})",
                        texts.len(),
                        self.model,
                        attempt + 1
                    );
                    return Ok(vectors);
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!("retrying embedding request after transient failure: {err}");
                    tokio::time::sleep(Self::retry_backoff(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
