//! Scripted embedding provider for tests and demos.
//!
//! Behavior comes from `provider_config`:
//!
//! ```json
//! {
//!   "rules": [{ "contains": "cat", "vector": [1.0, 0.0] }],
//!   "default": [0.5, 0.5],
//!   "fail_on": ["poison"],
//!   "fail_init": false,
//!   "delay_ms": 0
//! }
//! ```
//!
//! The first rule whose keyword occurs in the lowercased text wins.

use crate::embeddings::config::ProviderConfig;
use crate::embeddings::provider::EmbeddingProvider;
use crate::types::EmbeddingRole;
use docqa_core::{AppError, AppResult};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
struct Rule {
    contains: String,
    vector: Vec<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Script {
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    default: Option<Vec<f32>>,
    #[serde(default)]
    fail_on: Vec<String>,
    #[serde(default)]
    fail_init: bool,
    #[serde(default)]
    delay_ms: u64,
}

/// Mock provider with keyword-scripted vectors and injectable failures.
#[derive(Debug)]
pub struct MockProvider {
    model: String,
    dimensions: usize,
    rules: Vec<Rule>,
    default: Vec<f32>,
    fail_on: Vec<String>,
    delay: Duration,
}

impl MockProvider {
    pub fn from_config(config: &ProviderConfig) -> AppResult<Self> {
        let script: Script = if config.provider_config.is_null() {
            Script::default()
        } else {
            serde_json::from_value(config.provider_config.clone()).map_err(|e| {
                AppError::Config(format!("Invalid mock provider script: {}", e))
            })?
        };

        if script.fail_init {
            return Err(AppError::Embedding(format!(
                "Mock provider '{}' configured to fail initialization",
                config.model
            )));
        }

        let dimensions = config.dimensions;
        for rule in &script.rules {
            if rule.vector.len() != dimensions {
                return Err(AppError::Config(format!(
                    "Mock rule '{}' has {} dimensions, expected {}",
                    rule.contains,
                    rule.vector.len(),
                    dimensions
                )));
            }
        }

        let default = match script.default {
            Some(v) if v.len() == dimensions => v,
            Some(v) => {
                return Err(AppError::Config(format!(
                    "Mock default vector has {} dimensions, expected {}",
                    v.len(),
                    dimensions
                )))
            }
            None => vec![1.0 / (dimensions as f32).sqrt(); dimensions],
        };

        Ok(Self {
            model: config.model.clone(),
            dimensions,
            rules: script
                .rules
                .into_iter()
                .map(|r| Rule {
                    contains: r.contains.to_lowercase(),
                    vector: r.vector,
                })
                .collect(),
            default,
            fail_on: script.fail_on.iter().map(|s| s.to_lowercase()).collect(),
            delay: Duration::from_millis(script.delay_ms),
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str, _role: EmbeddingRole) -> AppResult<Vec<f32>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let lower = text.to_lowercase();

        if let Some(trigger) = self.fail_on.iter().find(|t| lower.contains(t.as_str())) {
            return Err(AppError::Embedding(format!(
                "Mock provider refused text containing '{}'",
                trigger
            )));
        }

        let vector = self
            .rules
            .iter()
            .find(|rule| lower.contains(rule.contains.as_str()))
            .map(|rule| rule.vector.clone())
            .unwrap_or_else(|| self.default.clone());

        Ok(vector)
    }
}
