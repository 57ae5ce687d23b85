//! Embedding configuration types.

use docqa_core::{AppError, AppResult, EmbeddingSettings};
use serde::{Deserialize, Serialize};

/// Default per-call timeout for provider requests.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Settings for one embedding backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Provider name: "gemini", "ollama", "trigram", "mock"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Custom endpoint for HTTP providers
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key for hosted providers
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Provider-specific configuration (JSON object)
    #[serde(default)]
    pub provider_config: serde_json::Value,
}

impl ProviderConfig {
    /// Defaults for a named provider.
    pub fn for_provider(provider: &str) -> AppResult<Self> {
        let (model, dimensions) = match provider {
            "gemini" => ("text-embedding-004", 768),
            "ollama" => ("nomic-embed-text", 768),
            "trigram" => ("trigram-v1", 384),
            "mock" => ("mock-v1", 384),
            other => {
                return Err(AppError::Config(format!(
                    "Unknown embedding provider: '{}'. Supported providers: gemini, ollama, trigram, mock",
                    other
                )))
            }
        };

        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
            dimensions,
            endpoint: None,
            api_key: None,
            provider_config: serde_json::json!({}),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_provider_config(mut self, provider_config: serde_json::Value) -> Self {
        self.provider_config = provider_config;
        self
    }
}

/// Adapter configuration: a preferred provider plus an optional fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Preferred provider
    pub primary: ProviderConfig,

    /// Provider used when the preferred one fails to start or breaks later
    #[serde(default)]
    pub fallback: Option<ProviderConfig>,

    /// Upper bound for a single provider call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            primary: ProviderConfig {
                provider: "ollama".to_string(),
                model: "nomic-embed-text".to_string(),
                dimensions: 768,
                endpoint: None,
                api_key: None,
                provider_config: serde_json::json!({}),
            },
            fallback: Some(ProviderConfig {
                provider: "trigram".to_string(),
                model: "trigram-v1".to_string(),
                dimensions: 384,
                endpoint: None,
                api_key: None,
                provider_config: serde_json::json!({}),
            }),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl EmbeddingConfig {
    /// Config with a single provider and no fallback.
    pub fn single(primary: ProviderConfig) -> Self {
        Self {
            primary,
            fallback: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_fallback(mut self, fallback: ProviderConfig) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Build the adapter config from application settings.
    ///
    /// `provider` is the resolved preferred provider name. The fallback
    /// defaults to `trigram`, which always starts, unless it would equal
    /// the preferred provider.
    pub fn from_settings(provider: &str, settings: &EmbeddingSettings) -> AppResult<Self> {
        let mut primary = ProviderConfig::for_provider(provider)?;
        if let Some(ref model) = settings.model {
            primary.model = model.clone();
        }
        if let Some(dimensions) = settings.dimensions {
            primary.dimensions = dimensions;
        }
        primary.endpoint = settings.endpoint.clone();
        primary.api_key = settings.api_key.clone();

        let fallback_name = settings
            .fallback
            .clone()
            .unwrap_or_else(|| "trigram".to_string());

        let fallback = if fallback_name == provider || fallback_name == "none" {
            None
        } else {
            let mut fallback = ProviderConfig::for_provider(&fallback_name)?;
            fallback.api_key = settings.api_key.clone();
            Some(fallback)
        };

        Ok(Self {
            primary,
            fallback,
            timeout_ms: settings
                .timeout_secs
                .map(|secs| secs * 1000)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        })
    }
}
