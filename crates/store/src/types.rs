//! Retrieval store type definitions.

use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Metadata key naming the source document (file name).
pub const KEY_SOURCE: &str = "source";
/// Metadata key for the page a chunk was taken from.
pub const KEY_PAGE_NUM: &str = "page_num";
/// Metadata key for the owning document's identifier.
pub const KEY_DOCUMENT_ID: &str = "document_id";
/// Metadata key for the chunk's position within its document.
pub const KEY_CHUNK_INDEX: &str = "chunk_index";
/// Metadata key for the number of chunks the document was split into.
pub const KEY_TOTAL_CHUNKS: &str = "total_chunks";
/// Metadata key for generated record ids.
pub const KEY_ID: &str = "id";
/// Metadata key for the position within the ingestion batch.
pub const KEY_INDEX: &str = "index";

/// A primitive metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(v) => write!(f, "{}", v),
            MetadataValue::Integer(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Integer(value as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Opaque provenance attached to a chunk.
///
/// The store never interprets these entries. The keys `source`, `page_num`
/// and `document_id` are what the response renderer reads for attribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    /// Source document name, if recorded.
    pub fn source(&self) -> Option<String> {
        self.get(KEY_SOURCE).map(|v| v.to_string())
    }

    /// Page number, if recorded as an integer.
    pub fn page_num(&self) -> Option<i64> {
        match self.get(KEY_PAGE_NUM) {
            Some(MetadataValue::Integer(n)) => Some(*n),
            Some(MetadataValue::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn document_id(&self) -> Option<String> {
        self.get(KEY_DOCUMENT_ID).map(|v| v.to_string())
    }

    /// Attribution line such as `Source: report.pdf, Page: 3`.
    ///
    /// Returns an empty string when neither key is present.
    pub fn source_label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(source) = self.source() {
            parts.push(format!("Source: {}", source));
        }
        if let Some(page) = self.page_num() {
            parts.push(format!("Page: {}", page));
        }
        parts.join(", ")
    }

    /// Check that every value survives the JSON round trip to disk.
    ///
    /// NaN and infinite floats are written as `null` and cannot be read
    /// back, so they are rejected up front.
    pub fn validate(&self) -> AppResult<()> {
        for (key, value) in &self.0 {
            if let MetadataValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(AppError::InvalidMetadata {
                        key: key.clone(),
                        reason: format!("non-finite float {}", f),
                    });
                }
            }
        }
        Ok(())
    }

    /// Minimal metadata for a text ingested without provenance.
    pub(crate) fn synthesized(index: usize) -> Self {
        Self::new()
            .with(KEY_ID, uuid::Uuid::new_v4().to_string())
            .with(KEY_INDEX, index)
    }
}

impl FromIterator<(String, MetadataValue)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (String, MetadataValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Whether a text is being indexed or searched for.
///
/// Some backends embed the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingRole {
    Document,
    Query,
}

/// Which backend produced a set of vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Provider name (e.g., "gemini", "ollama", "trigram")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Vector dimensions
    pub dimensions: usize,
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}d)", self.provider, self.model, self.dimensions)
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Chunk text
    pub text: String,

    /// Cosine similarity in [-1, 1]
    pub score: f32,

    /// Metadata passed through unchanged
    pub metadata: Metadata,
}

/// Statistics for the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Number of stored chunks
    pub records: usize,

    /// Distinct `source` values
    pub sources: usize,

    /// Identity of the collection's vectors, if any were stored
    pub collection_identity: Option<ProviderIdentity>,

    /// Identity of the adapter currently embedding
    pub active_identity: ProviderIdentity,

    /// Persisted file location
    pub storage_path: PathBuf,

    /// Persisted file size in bytes (0 when absent)
    pub file_size_bytes: u64,
}
