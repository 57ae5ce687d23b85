//! Document retrieval store.
//!
//! Turns pre-segmented text chunks into vectors through a fallback-aware
//! embedding adapter, keeps them in a single local collection persisted to
//! disk, and answers top-k cosine similarity queries.

pub mod collection;
pub mod config;
pub mod embeddings;
pub mod persist;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::{MismatchPolicy, StoreConfig};
pub use embeddings::{EmbeddedBatch, EmbeddingAdapter, EmbeddingConfig, ProviderConfig};
pub use store::VectorStore;
pub use types::{
    EmbeddingRole, Metadata, MetadataValue, ProviderIdentity, SearchResult, StoreStats,
};

use docqa_core::{AppConfig, AppResult};
use std::sync::Arc;

/// Build the adapter and open the store described by application config.
///
/// # Errors
/// * `AppError::Embedding` - If no embedding provider can be initialized
/// * `AppError::DimensionMismatch` - If the persisted collection does not
///   fit the active provider under the `reject` policy
pub async fn open_from_config(config: &AppConfig) -> AppResult<VectorStore> {
    let provider = config.embedding_provider();
    let embedding = EmbeddingConfig::from_settings(&provider, &config.embedding)?;
    let adapter = EmbeddingAdapter::new(embedding).await?;

    VectorStore::open(StoreConfig::from_app_config(config)?, Arc::new(adapter)).await
}
