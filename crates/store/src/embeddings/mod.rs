//! Embedding provider adapter.
//!
//! Hides which backend produced a vector behind `embed(text, role)` and
//! degrades gracefully:
//! - at construction, a failing preferred provider is replaced by the
//!   fallback; if that fails too, construction fails
//! - at call time, the first provider error triggers a single permanent
//!   downgrade to the fallback, which re-embeds the failing text
//! - if no provider can embed a text, a zero vector of the active
//!   dimension stands in for it

pub mod config;
pub mod provider;
pub mod providers;

pub use config::{EmbeddingConfig, ProviderConfig};
pub use provider::{create_backend, EmbeddingBackend, EmbeddingProvider};

use crate::types::{EmbeddingRole, ProviderIdentity};
use docqa_core::{AppError, AppResult};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

/// Vectors for a batch plus the identity that produced all of them.
#[derive(Debug, Clone)]
pub struct EmbeddedBatch {
    pub vectors: Vec<Vec<f32>>,
    pub identity: ProviderIdentity,
}

#[derive(Debug)]
struct ActiveBackend {
    backend: Arc<EmbeddingBackend>,
    /// Set once the one-time downgrade has been used up (or attempted).
    downgraded: bool,
}

/// Embedding adapter with one-shot provider fallback.
#[derive(Debug)]
pub struct EmbeddingAdapter {
    active: RwLock<ActiveBackend>,
    fallback: Option<ProviderConfig>,
    timeout: Duration,
    downgrade_lock: Mutex<()>,
}

async fn bounded<T>(
    timeout: Duration,
    what: &str,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Embedding(format!(
            "{} timed out after {}ms",
            what,
            timeout.as_millis()
        ))),
    }
}

impl EmbeddingAdapter {
    /// Build the adapter, falling back when the preferred provider cannot
    /// start.
    ///
    /// # Errors
    /// * `AppError::Embedding` - If neither provider can be initialized
    pub async fn new(config: EmbeddingConfig) -> AppResult<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let primary_err =
            match bounded(timeout, "Provider initialization", create_backend(&config.primary)).await {
                Ok(backend) => {
                    tracing::info!("Using embedding provider {}", backend.identity());
                    return Ok(Self::with_backend(backend, config.fallback, timeout));
                }
                Err(e) => e,
            };

        tracing::warn!(
            "Failed to initialize embedding provider '{}': {}",
            config.primary.provider,
            primary_err
        );

        let Some(fallback) = config.fallback else {
            return Err(AppError::Embedding(format!(
                "Could not initialize any embedding provider: {}",
                primary_err
            )));
        };

        match bounded(timeout, "Provider initialization", create_backend(&fallback)).await {
            Ok(backend) => {
                tracing::warn!("Falling back to embedding provider {}", backend.identity());
                Ok(Self {
                    active: RwLock::new(ActiveBackend {
                        backend: Arc::new(backend),
                        downgraded: true,
                    }),
                    fallback: None,
                    timeout,
                    downgrade_lock: Mutex::new(()),
                })
            }
            Err(fallback_err) => Err(AppError::Embedding(format!(
                "Could not initialize any embedding provider: '{}': {}; fallback '{}': {}",
                config.primary.provider, primary_err, fallback.provider, fallback_err
            ))),
        }
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(
        backend: EmbeddingBackend,
        fallback: Option<ProviderConfig>,
        timeout: Duration,
    ) -> Self {
        Self {
            active: RwLock::new(ActiveBackend {
                backend: Arc::new(backend),
                downgraded: false,
            }),
            fallback,
            timeout,
            downgrade_lock: Mutex::new(()),
        }
    }

    fn current(&self) -> Arc<EmbeddingBackend> {
        let guard = self.active.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard.backend)
    }

    /// Identity of the provider currently embedding.
    pub fn identity(&self) -> ProviderIdentity {
        self.current().identity()
    }

    /// Active dimension; also the length of zero-vector placeholders.
    pub fn dimensions(&self) -> usize {
        self.current().dimensions()
    }

    /// Whether the adapter is no longer on its preferred provider.
    pub fn has_downgraded(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .downgraded
    }

    async fn call(
        &self,
        backend: &EmbeddingBackend,
        text: &str,
        role: EmbeddingRole,
    ) -> AppResult<Vec<f32>> {
        let vector = bounded(self.timeout, "Embedding call", backend.embed(text, role)).await?;
        if vector.len() != backend.dimensions() {
            return Err(AppError::Embedding(format!(
                "Provider '{}' returned {} dimensions, expected {}",
                backend.provider_name(),
                vector.len(),
                backend.dimensions()
            )));
        }
        Ok(vector)
    }

    /// Swap to the fallback provider once.
    ///
    /// Returns the backend to retry with, or `None` when no further
    /// downgrade is possible.
    async fn downgrade(&self, failed: &Arc<EmbeddingBackend>) -> Option<Arc<EmbeddingBackend>> {
        let _guard = self.downgrade_lock.lock().await;

        {
            let active = self.active.read().unwrap_or_else(|e| e.into_inner());
            if !Arc::ptr_eq(&active.backend, failed) {
                // Another caller already switched providers.
                return Some(Arc::clone(&active.backend));
            }
            if active.downgraded {
                return None;
            }
        }

        let fallback = self.fallback.as_ref()?;
        let created = bounded(self.timeout, "Provider initialization", create_backend(fallback)).await;

        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        active.downgraded = true;

        match created {
            Ok(backend) => {
                tracing::warn!(
                    "Downgrading embedding provider from {} to {} for the rest of this process",
                    failed.identity(),
                    backend.identity()
                );
                active.backend = Arc::new(backend);
                Some(Arc::clone(&active.backend))
            }
            Err(e) => {
                tracing::error!("Fallback provider '{}' unavailable: {}", fallback.provider, e);
                None
            }
        }
    }

    /// Embed one text. Never fails: unembeddable text yields a zero vector.
    pub async fn embed(&self, text: &str, role: EmbeddingRole) -> Vec<f32> {
        let backend = self.current();

        let err = match self.call(&backend, text, role).await {
            Ok(vector) => return vector,
            Err(e) => e,
        };
        tracing::warn!(
            "Provider '{}' failed to embed text ({} chars): {}",
            backend.provider_name(),
            text.len(),
            err
        );

        if let Some(replacement) = self.downgrade(&backend).await {
            match self.call(&replacement, text, role).await {
                Ok(vector) => return vector,
                Err(e) => tracing::warn!(
                    "Fallback provider '{}' also failed: {}",
                    replacement.provider_name(),
                    e
                ),
            }
        }

        let dimensions = self.dimensions();
        tracing::warn!("Using {}-dimensional zero vector placeholder", dimensions);
        vec![0.0; dimensions]
    }

    /// Embed a batch so that every vector comes from the same provider.
    ///
    /// If the provider changes partway through, the batch is embedded again
    /// from the start under the new provider. The downgrade is one-time, so
    /// at most one extra pass happens.
    pub async fn embed_batch(&self, texts: &[String], role: EmbeddingRole) -> EmbeddedBatch {
        loop {
            let identity = self.identity();
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text, role).await);
            }

            let after = self.identity();
            if after == identity {
                return EmbeddedBatch { vectors, identity };
            }

            tracing::info!(
                "Provider changed from {} to {} mid-batch, re-embedding {} texts",
                identity,
                after,
                texts.len()
            );
        }
    }
}
