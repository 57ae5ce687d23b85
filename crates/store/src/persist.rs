//! On-disk format of the collection.
//!
//! Layout, little-endian:
//!
//! ```text
//! "DQVS" | version u32 | header_len u64 | header JSON | vectors f32[] | sha256 [32]
//! ```
//!
//! The JSON header carries the provider identity, texts and metadata. The
//! vectors follow as one row-major block. The trailing digest covers every
//! preceding byte.

use crate::collection::Collection;
use crate::config::tmp_path_for;
use crate::types::{Metadata, ProviderIdentity};
use chrono::{DateTime, Utc};
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 4] = b"DQVS";
const FORMAT_VERSION: u32 = 1;
const PREAMBLE_LEN: usize = 4 + 4 + 8;
const DIGEST_LEN: usize = 32;

#[derive(Serialize)]
struct HeaderOut<'a> {
    identity: Option<&'a ProviderIdentity>,
    texts: &'a [String],
    metadata: &'a [Metadata],
    saved_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct HeaderIn {
    identity: Option<ProviderIdentity>,
    texts: Vec<String>,
    metadata: Vec<Metadata>,
    saved_at: DateTime<Utc>,
}

/// Convert embedding vector to bytes (little-endian f32).
fn embedding_to_bytes(embedding: &[f32], out: &mut Vec<u8>) {
    out.reserve(embedding.len() * 4);
    for &value in embedding {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Store(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Serialize a collection into the binary format.
pub fn encode(collection: &Collection) -> AppResult<Vec<u8>> {
    let header = serde_json::to_vec(&HeaderOut {
        identity: collection.identity(),
        texts: collection.texts(),
        metadata: collection.metadata(),
        saved_at: Utc::now(),
    })?;

    let vectors = collection.raw_vectors();
    let mut bytes =
        Vec::with_capacity(PREAMBLE_LEN + header.len() + vectors.len() * 4 + DIGEST_LEN);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(header.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&header);
    embedding_to_bytes(vectors, &mut bytes);

    let digest = Sha256::digest(&bytes);
    bytes.extend_from_slice(&digest);

    Ok(bytes)
}

/// Parse the binary format, verifying checksum and invariants.
pub fn decode(bytes: &[u8]) -> AppResult<Collection> {
    if bytes.len() < PREAMBLE_LEN + DIGEST_LEN {
        return Err(AppError::Store(format!(
            "Store file too short ({} bytes)",
            bytes.len()
        )));
    }

    let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
    if Sha256::digest(body).as_slice() != digest {
        return Err(AppError::Store("Store file checksum mismatch".to_string()));
    }

    if &body[0..4] != MAGIC {
        return Err(AppError::Store("Not a docqa store file".to_string()));
    }

    let version = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
    if version != FORMAT_VERSION {
        return Err(AppError::Store(format!(
            "Unsupported store format version {}",
            version
        )));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&body[8..PREAMBLE_LEN]);
    let header_len = usize::try_from(u64::from_le_bytes(len_bytes))
        .map_err(|_| AppError::Store("Store header length overflows".to_string()))?;

    let header_end = PREAMBLE_LEN
        .checked_add(header_len)
        .filter(|&end| end <= body.len())
        .ok_or_else(|| AppError::Store("Store header is truncated".to_string()))?;

    let header: HeaderIn = serde_json::from_slice(&body[PREAMBLE_LEN..header_end])?;
    let vectors = bytes_to_embedding(&body[header_end..])?;
    tracing::debug!(
        "Decoded {} records saved at {}",
        header.texts.len(),
        header.saved_at.to_rfc3339()
    );

    Collection::from_parts(header.identity, header.texts, header.metadata, vectors)
}

/// Write the collection atomically: temp file, fsync, rename.
///
/// Returns the number of bytes written.
pub fn save(path: &Path, collection: &Collection) -> AppResult<u64> {
    let bytes = encode(collection)?;
    write_atomic(path, &bytes)?;
    Ok(bytes.len() as u64)
}

/// Replace `path` with `bytes` through a synced temp file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let tmp_path = tmp_path_for(path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let result = (|| -> AppResult<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Read the collection from `path`.
///
/// Returns `Ok(None)` when no file exists and an error when the file is
/// unreadable or corrupt.
pub fn load(path: &Path) -> AppResult<Option<Collection>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    decode(&bytes).map(Some)
}

/// Delete the persisted file. Returns whether a file was removed.
pub fn remove(path: &Path) -> AppResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddedBatch;
    use crate::types::{MetadataValue, KEY_PAGE_NUM, KEY_SOURCE};
    use tempfile::TempDir;

    fn sample() -> Collection {
        let mut collection = Collection::new();
        collection
            .append(
                vec!["alpha".to_string(), "beta".to_string()],
                vec![
                    Metadata::new()
                        .with(KEY_SOURCE, "a.pdf")
                        .with(KEY_PAGE_NUM, 2i64)
                        .with("score", 0.25f64)
                        .with("draft", true),
                    Metadata::new(),
                ],
                EmbeddedBatch {
                    vectors: vec![vec![0.1, -2.5, f32::MIN_POSITIVE], vec![0.0, 0.0, 0.0]],
                    identity: ProviderIdentity {
                        provider: "mock".to_string(),
                        model: "mock-v1".to_string(),
                        dimensions: 3,
                    },
                },
            )
            .unwrap();
        collection
    }

    #[test]
    fn test_save_and_load_is_exact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_db.bin");
        let collection = sample();

        let written = save(&path, &collection).unwrap();
        assert_eq!(written, fs::metadata(&path).unwrap().len());
        assert!(!tmp_path_for(&path).exists());

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded, collection);
        assert_eq!(
            loaded.metadata()[0].get("draft"),
            Some(&MetadataValue::Bool(true))
        );
    }

    #[test]
    fn test_empty_collection_round_trips() {
        let bytes = encode(&Collection::new()).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.is_empty());
        assert!(decoded.identity().is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("absent.bin")).unwrap().is_none());
    }

    #[test]
    fn test_flipped_byte_is_rejected() {
        let mut bytes = encode(&sample()).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xff;

        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let bytes = encode(&sample()).unwrap();
        assert!(decode(&bytes[..10]).is_err());
        assert!(decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_foreign_file_is_rejected() {
        let mut body = b"JUNKJUNKJUNKJUNKJUNK".to_vec();
        let digest = Sha256::digest(&body);
        body.extend_from_slice(&digest);
        assert!(decode(&body).unwrap_err().to_string().contains("Not a docqa"));
    }

    #[test]
    fn test_remove_reports_presence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_db.bin");
        save(&path, &sample()).unwrap();

        assert!(remove(&path).unwrap());
        assert!(!remove(&path).unwrap());
    }
}
