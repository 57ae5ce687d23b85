//! Persistent vector store over the embedding adapter.

use crate::collection::Collection;
use crate::config::{MismatchPolicy, StoreConfig};
use crate::embeddings::EmbeddingAdapter;
use crate::persist;
use crate::types::{EmbeddingRole, Metadata, ProviderIdentity, SearchResult, StoreStats};
use docqa_core::{AppError, AppResult};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Store(format!("Blocking file task failed: {}", e)))?
}

/// Whether stored vectors no longer match vectors of `dimensions`.
fn is_stale(collection: &Collection, dimensions: usize) -> bool {
    !collection.is_empty() && collection.dimensions() != Some(dimensions)
}

/// Ordered collection of chunk records, persisted after every change.
///
/// Searches share a read lock. Appends, clear and reindex take the write
/// lock. New batches are embedded before the lock is taken. File I/O runs on
/// the blocking pool while the lock is held, so saves land in order.
#[derive(Debug)]
pub struct VectorStore {
    collection: RwLock<Collection>,
    adapter: Arc<EmbeddingAdapter>,
    config: StoreConfig,
}

impl VectorStore {
    /// Open the store, loading any persisted collection.
    ///
    /// A corrupt file is logged and the store starts empty. A collection
    /// embedded at another dimension is handled by `config.on_mismatch`.
    ///
    /// # Errors
    /// * `AppError::Io` - If the storage directory cannot be created
    /// * `AppError::DimensionMismatch` - If the persisted vectors do not fit
    ///   the active provider and the policy is `reject`
    pub async fn open(config: StoreConfig, adapter: Arc<EmbeddingAdapter>) -> AppResult<Self> {
        tokio::fs::create_dir_all(&config.storage_dir).await?;

        let path = config.db_path();
        let load_path = path.clone();
        let collection = match blocking(move || persist::load(&load_path)).await {
            Ok(Some(collection)) => {
                info!("Loaded {} records from {:?}", collection.len(), path);
                collection
            }
            Ok(None) => {
                debug!("No store file at {:?}, starting empty", path);
                Collection::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable store file {:?}: {}", path, e);
                Collection::new()
            }
        };

        let store = Self {
            collection: RwLock::new(collection),
            adapter,
            config,
        };
        store.reconcile().await?;

        Ok(store)
    }

    /// Check the loaded collection against the active provider.
    async fn reconcile(&self) -> AppResult<()> {
        let active = self.adapter.identity();
        let stored = {
            let collection = self.collection.read().await;
            match collection.identity() {
                Some(identity) if !collection.is_empty() => identity.clone(),
                _ => return Ok(()),
            }
        };

        if stored.dimensions == active.dimensions {
            if stored != active {
                warn!(
                    "Store was built with {}, now embedding with {}",
                    stored, active
                );
            }
            return Ok(());
        }

        match self.config.on_mismatch {
            MismatchPolicy::Reject => Err(AppError::DimensionMismatch {
                expected: active.dimensions,
                actual: stored.dimensions,
            }),
            MismatchPolicy::Reindex => {
                info!(
                    "Store was built with {}, re-embedding with {}",
                    stored, active
                );
                self.reindex().await.map(|_| ())
            }
        }
    }

    /// Save the collection. Failures are logged; memory stays authoritative.
    async fn persist(&self, collection: &Collection) {
        let path = self.config.db_path();
        let bytes = match persist::encode(collection) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode store for {:?}: {}", path, e);
                return;
            }
        };

        let size = bytes.len();
        let target: PathBuf = path.clone();
        match blocking(move || persist::write_atomic(&target, &bytes)).await {
            Ok(()) => debug!("Persisted {} records ({} bytes)", collection.len(), size),
            Err(e) => error!("Failed to persist store to {:?}: {}", path, e),
        }
    }

    /// Re-embed every stored text in place. The caller holds the write lock
    /// and persists afterwards.
    ///
    /// With `target` set, the new vectors must have that dimension or the
    /// collection is left unchanged.
    async fn reembed(
        &self,
        collection: &mut Collection,
        target: Option<usize>,
    ) -> AppResult<usize> {
        if collection.is_empty() {
            return Ok(0);
        }

        let batch = self
            .adapter
            .embed_batch(collection.texts(), EmbeddingRole::Document)
            .await;

        if let Some(expected) = target {
            if batch.identity.dimensions != expected {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: batch.identity.dimensions,
                });
            }
        }

        let identity = batch.identity.clone();
        collection.replace_vectors(batch)?;
        info!("Re-embedded {} records with {}", collection.len(), identity);
        Ok(collection.len())
    }

    /// Embed and append a batch of texts.
    ///
    /// Without explicit metadata each text gets `{id, index}`. If the
    /// provider changed dimension since the collection was built, the
    /// `reindex` policy re-embeds the stored records before appending.
    ///
    /// # Errors
    /// * `AppError::MetadataLengthMismatch` - If metadata and texts differ in
    ///   length
    /// * `AppError::InvalidMetadata` - If a metadata value cannot be persisted
    /// * `AppError::DimensionMismatch` - If the batch was embedded at a
    ///   dimension other than the collection's under the `reject` policy
    #[instrument(skip(self, texts, metadata), fields(count = texts.len()))]
    pub async fn add_documents(
        &self,
        texts: Vec<String>,
        metadata: Option<Vec<Metadata>>,
    ) -> AppResult<usize> {
        if texts.is_empty() {
            return Ok(0);
        }

        let metadata = match metadata {
            Some(metadata) if metadata.len() != texts.len() => {
                return Err(AppError::MetadataLengthMismatch {
                    texts: texts.len(),
                    metadata: metadata.len(),
                });
            }
            Some(metadata) => metadata,
            None => (0..texts.len()).map(Metadata::synthesized).collect(),
        };
        for entry in &metadata {
            entry.validate()?;
        }

        let batch = self
            .adapter
            .embed_batch(&texts, EmbeddingRole::Document)
            .await;

        let mut collection = self.collection.write().await;
        if self.config.on_mismatch == MismatchPolicy::Reindex
            && is_stale(&collection, batch.identity.dimensions)
        {
            info!(
                "Provider is now {}, re-embedding stored records before append",
                batch.identity
            );
            self.reembed(&mut collection, Some(batch.identity.dimensions))
                .await?;
        }

        let added = collection.append(texts, metadata, batch)?;
        self.persist(&collection).await;

        info!("Added {} records ({} total)", added, collection.len());
        Ok(added)
    }

    /// The `top_k` most similar records to `query`.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        self.ranked(query, top_k, None).await
    }

    /// Like [`search`](Self::search), dropping results scored below
    /// `min_score`.
    pub async fn search_with_min_score(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
    ) -> Vec<SearchResult> {
        self.ranked(query, top_k, Some(min_score)).await
    }

    #[instrument(skip(self, query), fields(query_len = query.len()))]
    async fn ranked(&self, query: &str, top_k: usize, min_score: Option<f32>) -> Vec<SearchResult> {
        if top_k == 0 || self.is_empty().await {
            return Vec::new();
        }

        let query_vector = self.adapter.embed(query, EmbeddingRole::Query).await;

        let stale = self.config.on_mismatch == MismatchPolicy::Reindex
            && is_stale(&*self.collection.read().await, query_vector.len());
        if stale {
            let mut collection = self.collection.write().await;
            if is_stale(&collection, query_vector.len()) {
                match self.reembed(&mut collection, Some(query_vector.len())).await {
                    Ok(_) => self.persist(&collection).await,
                    Err(e) => warn!("Could not re-embed store for search: {}", e),
                }
            }
        }

        let collection = self.collection.read().await;
        let ranked = match collection.rank(&query_vector, top_k) {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!("Search failed, returning no results: {}", e);
                return Vec::new();
            }
        };

        let results: Vec<SearchResult> = ranked
            .into_iter()
            .filter(|(_, score)| min_score.map_or(true, |min| *score >= min))
            .map(|(index, score)| SearchResult {
                text: collection.texts()[index].clone(),
                score,
                metadata: collection.metadata()[index].clone(),
            })
            .collect();

        debug!(
            "Search returned {} results (top score: {:.3})",
            results.len(),
            results.first().map(|r| r.score).unwrap_or(0.0)
        );
        results
    }

    /// Remove every record and delete the persisted file.
    pub async fn clear(&self) {
        let mut collection = self.collection.write().await;
        let dropped = collection.len();
        collection.clear();

        let path = self.config.db_path();
        let target = path.clone();
        match blocking(move || persist::remove(&target)).await {
            Ok(_) => info!("Cleared store ({} records)", dropped),
            Err(e) => error!("Failed to delete store file {:?}: {}", path, e),
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.collection.read().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.collection.read().await.len()
    }

    /// Identity of the provider that embedded the stored vectors.
    pub async fn identity(&self) -> Option<ProviderIdentity> {
        self.collection.read().await.identity().cloned()
    }

    pub fn adapter(&self) -> &Arc<EmbeddingAdapter> {
        &self.adapter
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub async fn stats(&self) -> StoreStats {
        let collection = self.collection.read().await;
        let sources: BTreeSet<String> = collection
            .metadata()
            .iter()
            .filter_map(|m| m.source())
            .collect();

        let storage_path = self.config.db_path();
        let file_size_bytes = tokio::fs::metadata(&storage_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        StoreStats {
            records: collection.len(),
            sources: sources.len(),
            collection_identity: collection.identity().cloned(),
            active_identity: self.adapter.identity(),
            storage_path,
            file_size_bytes,
        }
    }

    /// Re-embed every stored text with the adapter's current provider.
    ///
    /// Returns the number of records re-embedded.
    pub async fn reindex(&self) -> AppResult<usize> {
        let mut collection = self.collection.write().await;
        let count = self.reembed(&mut collection, None).await?;
        if count > 0 {
            self.persist(&collection).await;
        }
        Ok(count)
    }
}
