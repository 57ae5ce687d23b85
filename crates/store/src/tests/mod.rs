//! Scenario tests for the store as a whole.

mod concurrency;
mod retrieval;

use crate::config::{MismatchPolicy, StoreConfig};
use crate::embeddings::{EmbeddingAdapter, EmbeddingConfig, ProviderConfig};
use crate::store::VectorStore;
use std::path::Path;
use std::sync::Arc;

pub(crate) fn mock_provider(dimensions: usize, script: serde_json::Value) -> ProviderConfig {
    ProviderConfig::for_provider("mock")
        .unwrap()
        .with_dimensions(dimensions)
        .with_provider_config(script)
}

pub(crate) async fn mock_adapter(
    dimensions: usize,
    script: serde_json::Value,
) -> Arc<EmbeddingAdapter> {
    let config = EmbeddingConfig::single(mock_provider(dimensions, script));
    Arc::new(EmbeddingAdapter::new(config).await.unwrap())
}

pub(crate) async fn open_store(
    dir: &Path,
    adapter: Arc<EmbeddingAdapter>,
    policy: MismatchPolicy,
) -> VectorStore {
    VectorStore::open(StoreConfig::new(dir).with_policy(policy), adapter)
        .await
        .unwrap()
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
