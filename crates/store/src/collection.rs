//! In-memory collection of chunk records and exact cosine ranking.
//!
//! Records are stored column-wise: texts, metadata and one flat row-major
//! vector buffer. Position in these columns is the record's identity.

use crate::embeddings::EmbeddedBatch;
use crate::types::{Metadata, ProviderIdentity};
use docqa_core::{AppError, AppResult};
use ndarray::{ArrayView1, ArrayView2, Axis};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    texts: Vec<String>,
    metadata: Vec<Metadata>,
    vectors: Vec<f32>,
    identity: Option<ProviderIdentity>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a collection from its columns, checking every invariant.
    pub fn from_parts(
        identity: Option<ProviderIdentity>,
        texts: Vec<String>,
        metadata: Vec<Metadata>,
        vectors: Vec<f32>,
    ) -> AppResult<Self> {
        if texts.len() != metadata.len() {
            return Err(AppError::Store(format!(
                "Corrupt collection: {} texts but {} metadata entries",
                texts.len(),
                metadata.len()
            )));
        }

        let dimensions = identity.as_ref().map(|i| i.dimensions).unwrap_or(0);
        if identity.is_none() && !texts.is_empty() {
            return Err(AppError::Store(
                "Corrupt collection: records without a provider identity".to_string(),
            ));
        }
        if vectors.len() != texts.len() * dimensions {
            return Err(AppError::Store(format!(
                "Corrupt collection: {} floats for {} records of {} dimensions",
                vectors.len(),
                texts.len(),
                dimensions
            )));
        }

        Ok(Self {
            texts,
            metadata,
            vectors,
            identity,
        })
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Identity of the provider that embedded the stored vectors.
    pub fn identity(&self) -> Option<&ProviderIdentity> {
        self.identity.as_ref()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.identity.as_ref().map(|i| i.dimensions)
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    /// Flat row-major vector buffer.
    pub fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        let d = self.dimensions()?;
        self.vectors.get(index * d..(index + 1) * d)
    }

    /// Check that a batch can be appended without breaking the matrix.
    pub fn validate_batch(
        &self,
        texts: &[String],
        metadata: &[Metadata],
        batch: &EmbeddedBatch,
    ) -> AppResult<()> {
        if texts.len() != metadata.len() || texts.len() != batch.vectors.len() {
            return Err(AppError::Store(format!(
                "Batch columns disagree: {} texts, {} metadata, {} vectors",
                texts.len(),
                metadata.len(),
                batch.vectors.len()
            )));
        }

        for entry in metadata {
            entry.validate()?;
        }

        let dimensions = batch.identity.dimensions;
        if let Some(bad) = batch.vectors.iter().find(|v| v.len() != dimensions) {
            return Err(AppError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        if let Some(existing) = self.identity.as_ref().filter(|_| !self.is_empty()) {
            if existing.dimensions != dimensions {
                return Err(AppError::DimensionMismatch {
                    expected: existing.dimensions,
                    actual: dimensions,
                });
            }
            if existing != &batch.identity {
                tracing::warn!(
                    "Appending vectors from {} to a collection built with {}",
                    batch.identity,
                    existing
                );
            }
        }

        Ok(())
    }

    /// Append a validated batch. Nothing is mutated on error.
    pub fn append(
        &mut self,
        texts: Vec<String>,
        metadata: Vec<Metadata>,
        batch: EmbeddedBatch,
    ) -> AppResult<usize> {
        self.validate_batch(&texts, &metadata, &batch)?;

        let added = texts.len();
        if self.is_empty() {
            self.identity = Some(batch.identity);
        }

        self.texts.extend(texts);
        self.metadata.extend(metadata);
        self.vectors.reserve(added * self.dimensions().unwrap_or(0));
        for vector in batch.vectors {
            self.vectors.extend(vector);
        }

        Ok(added)
    }

    /// Swap every vector for ones produced by another provider.
    pub fn replace_vectors(&mut self, batch: EmbeddedBatch) -> AppResult<()> {
        if batch.vectors.len() != self.len() {
            return Err(AppError::Store(format!(
                "Re-embedding produced {} vectors for {} records",
                batch.vectors.len(),
                self.len()
            )));
        }

        let dimensions = batch.identity.dimensions;
        if let Some(bad) = batch.vectors.iter().find(|v| v.len() != dimensions) {
            return Err(AppError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        self.vectors = batch.vectors.into_iter().flatten().collect();
        self.identity = Some(batch.identity);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.texts.clear();
        self.metadata.clear();
        self.vectors.clear();
        self.identity = None;
    }

    /// Cosine similarity of `query` against every stored vector.
    ///
    /// Computed as one matrix-vector product. Zero-norm rows (placeholder
    /// vectors) and a zero-norm query score 0.
    pub fn similarities(&self, query: &[f32]) -> AppResult<Vec<f32>> {
        let Some(dimensions) = self.dimensions().filter(|_| !self.is_empty()) else {
            return Ok(Vec::new());
        };

        if query.len() != dimensions {
            return Err(AppError::DimensionMismatch {
                expected: dimensions,
                actual: query.len(),
            });
        }

        let matrix = ArrayView2::from_shape((self.len(), dimensions), &self.vectors)
            .map_err(|e| AppError::Store(format!("Vector matrix is malformed: {}", e)))?;
        let q = ArrayView1::from(query);

        let dots = matrix.dot(&q);
        let row_norms = matrix.map_axis(Axis(1), |row| row.dot(&row).sqrt());
        let query_norm = q.dot(&q).sqrt();

        let scores = dots
            .iter()
            .zip(row_norms.iter())
            .map(|(&dot, &norm)| {
                let denom = norm * query_norm;
                if denom == 0.0 || !denom.is_finite() {
                    0.0
                } else {
                    let score = dot / denom;
                    if score.is_finite() {
                        score.clamp(-1.0, 1.0)
                    } else {
                        0.0
                    }
                }
            })
            .collect();

        Ok(scores)
    }

    /// Indices and scores of the `top_k` best matches.
    ///
    /// Descending by score; equal scores keep insertion order.
    pub fn rank(&self, query: &[f32], top_k: usize) -> AppResult<Vec<(usize, f32)>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let scores = self.similarities(query)?;
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_unstable_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
        order.truncate(top_k);

        Ok(order.into_iter().map(|i| (i, scores[i])).collect())
    }
}
