//! Embedding provider trait and factory.

use super::config::ProviderConfig;
use super::providers::{GeminiProvider, MockProvider, OllamaProvider, TrigramProvider};
use crate::types::{EmbeddingRole, ProviderIdentity};
use docqa_core::{AppError, AppResult};

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "gemini", "ollama", "trigram")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate the embedding for a single text.
    async fn embed(&self, text: &str, role: EmbeddingRole) -> AppResult<Vec<f32>>;

    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            provider: self.provider_name().to_string(),
            model: self.model_name().to_string(),
            dimensions: self.dimensions(),
        }
    }
}

/// The closed set of backends the adapter can run on.
#[derive(Debug)]
pub enum EmbeddingBackend {
    Gemini(GeminiProvider),
    Ollama(OllamaProvider),
    Trigram(TrigramProvider),
    Mock(MockProvider),
}

impl EmbeddingBackend {
    fn as_provider(&self) -> &dyn EmbeddingProvider {
        match self {
            EmbeddingBackend::Gemini(p) => p,
            EmbeddingBackend::Ollama(p) => p,
            EmbeddingBackend::Trigram(p) => p,
            EmbeddingBackend::Mock(p) => p,
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for EmbeddingBackend {
    fn provider_name(&self) -> &str {
        self.as_provider().provider_name()
    }

    fn model_name(&self) -> &str {
        self.as_provider().model_name()
    }

    fn dimensions(&self) -> usize {
        self.as_provider().dimensions()
    }

    async fn embed(&self, text: &str, role: EmbeddingRole) -> AppResult<Vec<f32>> {
        self.as_provider().embed(text, role).await
    }
}

/// Create an embedding backend from configuration.
///
/// Network-backed providers verify they can actually embed before
/// returning, so a misconfigured provider fails here rather than on the
/// first document.
pub async fn create_backend(config: &ProviderConfig) -> AppResult<EmbeddingBackend> {
    if config.dimensions == 0 {
        return Err(AppError::Config(format!(
            "Provider '{}' configured with zero dimensions",
            config.provider
        )));
    }

    match config.provider.as_str() {
        "gemini" => Ok(EmbeddingBackend::Gemini(
            GeminiProvider::new(config.clone()).await?,
        )),
        "ollama" => Ok(EmbeddingBackend::Ollama(
            OllamaProvider::new(config.clone()).await?,
        )),
        "trigram" => Ok(EmbeddingBackend::Trigram(TrigramProvider::new(
            config.dimensions,
        ))),
        "mock" => Ok(EmbeddingBackend::Mock(MockProvider::from_config(config)?)),
        _ => Err(AppError::Embedding(format!(
            "Unknown embedding provider: '{}'. Supported providers: gemini, ollama, trigram, mock",
            config.provider
        ))),
    }
}
