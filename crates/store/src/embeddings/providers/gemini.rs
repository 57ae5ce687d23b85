//! Hosted embedding provider backed by Google's Generative Language API.
//!
//! Calls `models/{model}:embedContent` with the task type derived from the
//! embedding role, so documents and queries are embedded asymmetrically.

use crate::embeddings::config::ProviderConfig;
use crate::embeddings::provider::EmbeddingProvider;
use crate::types::EmbeddingRole;
use async_trait::async_trait;
use docqa_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Google embedding provider
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: &'static str,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn task_type(role: EmbeddingRole) -> &'static str {
    match role {
        EmbeddingRole::Document => "RETRIEVAL_DOCUMENT",
        EmbeddingRole::Query => "RETRIEVAL_QUERY",
    }
}

impl GeminiProvider {
    /// Create a provider and check the API once.
    ///
    /// # Errors
    /// * `AppError::Embedding` - If no API key is configured, the API is
    ///   unreachable or returns vectors of the wrong size
    pub async fn new(config: ProviderConfig) -> AppResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AppError::Embedding(
                "Gemini provider requires an API key (DOCQA_API_KEY or GOOGLE_API_KEY)"
                    .to_string(),
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Embedding(format!("Failed to create HTTP client for Gemini: {}", e))
            })?;

        let provider = Self {
            client,
            base_url: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: config.model,
            dimensions: config.dimensions,
        };

        let sample = provider
            .request("test connection", EmbeddingRole::Document)
            .await?;
        if sample.len() != provider.dimensions {
            return Err(AppError::Embedding(format!(
                "Gemini model '{}' returned {} dimensions, expected {}",
                provider.model,
                sample.len(),
                provider.dimensions
            )));
        }

        debug!("Gemini embedding model '{}' ready", provider.model);
        Ok(provider)
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn request(&self, text: &str, role: EmbeddingRole) -> AppResult<Vec<f32>> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);

        let body = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: [Part { text }],
            },
            task_type: task_type(role),
            output_dimensionality: self.dimensions,
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to send request to Gemini: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);

            return Err(AppError::Embedding(format!(
                "Gemini API error ({}): {}",
                status, message
            )));
        }

        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse Gemini response: {}", e)))?;

        Ok(parsed.embedding.values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str, role: EmbeddingRole) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            warn!("Empty text, returning zero vector");
            return Ok(vec![0.0; self.dimensions]);
        }

        let embedding = self.request(text, role).await?;
        if embedding.len() != self.dimensions {
            return Err(AppError::Embedding(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                embedding.len(),
                self.dimensions
            )));
        }

        Ok(embedding)
    }
}
