//! Ingest command handler.
//!
//! Reads pre-chunked documents as JSONL, one chunk per line:
//!
//! ```json
//! {"text": "Cats are mammals", "metadata": {"source": "a.pdf", "page_num": 1}}
//! ```
//!
//! Lines without metadata are attributed to their file.

use anyhow::Context;
use clap::Args;
use docqa_store::types::{KEY_CHUNK_INDEX, KEY_SOURCE};
use docqa_store::{Metadata, VectorStore};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Add chunks from JSONL files to the store
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// JSONL files, or directories searched for `*.jsonl`
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkLine {
    text: String,
    #[serde(default)]
    metadata: Option<Metadata>,
}

/// Expand directories into the JSONL files below them, sorted.
fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            anyhow::bail!("Path does not exist: {}", path.display());
        }
    }

    Ok(files)
}

/// Parse one JSONL file into texts and metadata.
fn read_chunks(path: &Path) -> anyhow::Result<(Vec<String>, Vec<Metadata>)> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut texts = Vec::new();
    let mut metadata = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let chunk: ChunkLine = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid chunk line", path.display(), line_no + 1))?;

        let index = texts.len();
        metadata.push(chunk.metadata.unwrap_or_else(|| {
            Metadata::new()
                .with(KEY_SOURCE, file_name.as_str())
                .with(KEY_CHUNK_INDEX, index)
        }));
        texts.push(chunk.text);
    }

    Ok((texts, metadata))
}

impl IngestCommand {
    pub async fn execute(&self, store: &VectorStore) -> anyhow::Result<()> {
        tracing::info!("Executing ingest command for {} paths", self.paths.len());

        let files = collect_files(&self.paths)?;
        let mut chunks = 0usize;

        for file in &files {
            let (texts, metadata) = read_chunks(file)?;
            let added = store
                .add_documents(texts, Some(metadata))
                .await
                .with_context(|| format!("Failed to ingest {}", file.display()))?;
            tracing::debug!("Ingested {} chunks from {:?}", added, file);
            chunks += added;
        }

        let total = store.len().await;
        if self.json {
            let output = serde_json::json!({
                "files": files.len(),
                "chunks": chunks,
                "total": total,
                "degraded": store.adapter().has_downgraded(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Ingested {} chunks from {} files ({} total)",
                chunks,
                files.len(),
                total
            );
            if store.adapter().has_downgraded() {
                println!("Note: embedded with fallback provider {}", store.adapter().identity());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_chunks_with_and_without_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"text": "Cats are mammals", "metadata": {"source": "a.pdf", "page_num": 3}}"#,
                "\n\n",
                r#"{"text": "Stock prices rose"}"#,
                "\n",
            ),
        )
        .unwrap();

        let (texts, metadata) = read_chunks(&path).unwrap();
        assert_eq!(texts, vec!["Cats are mammals", "Stock prices rose"]);
        assert_eq!(metadata[0].source_label(), "Source: a.pdf, Page: 3");
        assert_eq!(metadata[1].source().as_deref(), Some("notes.jsonl"));
        assert_eq!(metadata[1].get(KEY_CHUNK_INDEX).unwrap().to_string(), "1");
    }

    #[test]
    fn test_read_chunks_reports_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"text\": \"ok\"}\nnot json\n").unwrap();

        let err = read_chunks(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.jsonl:2"));
    }

    #[test]
    fn test_collect_files_walks_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.jsonl"), "").unwrap();
        std::fs::write(dir.path().join("sub").join("a.jsonl"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().unwrap() == "jsonl"));

        assert!(collect_files(&[dir.path().join("missing")]).is_err());
    }
}
