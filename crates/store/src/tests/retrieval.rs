//! Ingest and search behavior.

use super::{mock_adapter, mock_provider, open_store, strings};
use crate::config::MismatchPolicy;
use crate::embeddings::{EmbeddingAdapter, EmbeddingConfig, ProviderConfig};
use crate::types::{EmbeddingRole, Metadata, KEY_ID, KEY_INDEX, KEY_PAGE_NUM, KEY_SOURCE};
use docqa_core::AppError;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn topics_script() -> serde_json::Value {
    json!({
        "rules": [
            { "contains": "cat", "vector": [1.0, 0.0] },
            { "contains": "stock", "vector": [0.0, 1.0] },
            { "contains": "animals", "vector": [0.9, 0.1] }
        ]
    })
}

#[tokio::test]
async fn test_query_finds_topical_chunk() {
    let dir = TempDir::new().unwrap();
    let store = open_store(
        dir.path(),
        mock_adapter(2, topics_script()).await,
        MismatchPolicy::Reject,
    )
    .await;

    store
        .add_documents(
            strings(&["cats are mammals", "the stock market fell today"]),
            Some(vec![
                Metadata::new().with(KEY_SOURCE, "a.pdf").with(KEY_PAGE_NUM, 1i64),
                Metadata::new().with(KEY_SOURCE, "b.pdf").with(KEY_PAGE_NUM, 4i64),
            ]),
        )
        .await
        .unwrap();

    let results = store.search("tell me about animals", 1).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "cats are mammals");
    assert!(results[0].score > 0.99);
    assert_eq!(results[0].metadata.source_label(), "Source: a.pdf, Page: 1");

    let both = store.search("tell me about animals", 5).await;
    assert_eq!(both.len(), 2);
    assert_eq!(both[1].text, "the stock market fell today");
    assert!(both[0].score > both[1].score);
}

#[tokio::test]
async fn test_min_score_drops_weak_matches() {
    let dir = TempDir::new().unwrap();
    let store = open_store(
        dir.path(),
        mock_adapter(2, topics_script()).await,
        MismatchPolicy::Reject,
    )
    .await;

    store
        .add_documents(
            strings(&["cats are mammals", "the stock market fell today"]),
            None,
        )
        .await
        .unwrap();

    let results = store
        .search_with_min_score("tell me about animals", 5, 0.5)
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "cats are mammals");
}

#[tokio::test]
async fn test_size_grows_by_batch_length() {
    let dir = TempDir::new().unwrap();
    let store = open_store(
        dir.path(),
        mock_adapter(4, json!({})).await,
        MismatchPolicy::Reject,
    )
    .await;

    assert!(store.is_empty().await);
    assert_eq!(store.add_documents(strings(&["a", "b", "c"]), None).await.unwrap(), 3);
    assert_eq!(store.add_documents(strings(&["d"]), None).await.unwrap(), 1);
    assert_eq!(store.len().await, 4);
    assert!(!store.is_empty().await);
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let dir = TempDir::new().unwrap();
    let store = open_store(
        dir.path(),
        mock_adapter(4, json!({})).await,
        MismatchPolicy::Reject,
    )
    .await;

    assert_eq!(store.add_documents(Vec::new(), None).await.unwrap(), 0);
    assert!(store.is_empty().await);
    assert!(store.identity().await.is_none());
    assert!(!store.config().db_path().exists());
}

#[tokio::test]
async fn test_search_on_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = open_store(
        dir.path(),
        mock_adapter(4, json!({})).await,
        MismatchPolicy::Reject,
    )
    .await;

    assert!(store.search("anything", 5).await.is_empty());

    store.add_documents(strings(&["something"]), None).await.unwrap();
    assert!(store.search("anything", 0).await.is_empty());
}

#[tokio::test]
async fn test_top_k_bound_and_tie_order() {
    let dir = TempDir::new().unwrap();
    // Every text maps to the same default vector, so all scores tie.
    let store = open_store(
        dir.path(),
        mock_adapter(3, json!({})).await,
        MismatchPolicy::Reject,
    )
    .await;

    store
        .add_documents(strings(&["one", "two", "three", "four", "five"]), None)
        .await
        .unwrap();

    let top3 = store.search("query", 3).await;
    let texts: Vec<&str> = top3.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);

    assert_eq!(store.search("query", 10).await.len(), 5);
}

#[tokio::test]
async fn test_results_are_sorted_descending() {
    let dir = TempDir::new().unwrap();
    let script = json!({
        "rules": [
            { "contains": "far", "vector": [0.0, 1.0] },
            { "contains": "near", "vector": [1.0, 0.1] },
            { "contains": "mid", "vector": [1.0, 1.0] },
            { "contains": "target", "vector": [1.0, 0.0] }
        ]
    });
    let store = open_store(dir.path(), mock_adapter(2, script).await, MismatchPolicy::Reject).await;

    store
        .add_documents(strings(&["far away", "mid point", "near by"]), None)
        .await
        .unwrap();

    let results = store.search("target", 3).await;
    let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["near by", "mid point", "far away"]);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_missing_metadata_is_synthesized() {
    let dir = TempDir::new().unwrap();
    let store = open_store(
        dir.path(),
        mock_adapter(2, json!({})).await,
        MismatchPolicy::Reject,
    )
    .await;

    store
        .add_documents(strings(&["first", "second"]), None)
        .await
        .unwrap();

    let results = store.search("q", 2).await;
    assert_eq!(results[1].metadata.get(KEY_INDEX).unwrap().to_string(), "1");
    let ids: Vec<String> = results
        .iter()
        .map(|r| r.metadata.get(KEY_ID).unwrap().to_string())
        .collect();
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_metadata_length_mismatch_leaves_store_untouched() {
    let dir = TempDir::new().unwrap();
    let store = open_store(
        dir.path(),
        mock_adapter(2, json!({})).await,
        MismatchPolicy::Reject,
    )
    .await;

    let result = store
        .add_documents(strings(&["a", "b"]), Some(vec![Metadata::new()]))
        .await;

    assert!(matches!(
        result,
        Err(AppError::MetadataLengthMismatch {
            texts: 2,
            metadata: 1
        })
    ));
    assert!(store.is_empty().await);
    assert!(!store.config().db_path().exists());
}

#[tokio::test]
async fn test_failed_chunk_gets_zero_vector() {
    let dir = TempDir::new().unwrap();
    let script = json!({
        "rules": [{ "contains": "good", "vector": [1.0, 0.0, 0.0] }],
        "fail_on": ["poison"]
    });
    let store = open_store(dir.path(), mock_adapter(3, script).await, MismatchPolicy::Reject).await;

    let added = store
        .add_documents(
            strings(&["good chunk one", "poison chunk", "good chunk two"]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(added, 3);
    assert_eq!(store.len().await, 3);

    // The placeholder scores 0 and ranks after the real matches.
    let results = store.search("good", 3).await;
    assert_eq!(results[2].text, "poison chunk");
    assert_eq!(results[2].score, 0.0);
}

#[tokio::test]
async fn test_downgrade_mid_session_rejects_mixed_dimensions() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(EmbeddingAdapter::new(downgrading_adapter_config()).await.unwrap());
    let store = open_store(dir.path(), adapter, MismatchPolicy::Reject).await;

    store.add_documents(strings(&["steady"]), None).await.unwrap();

    let result = store.add_documents(strings(&["flaky input"]), None).await;
    assert!(matches!(
        result,
        Err(AppError::DimensionMismatch {
            expected: 2,
            actual: 8
        })
    ));
    assert_eq!(store.len().await, 1);
    assert!(store.adapter().has_downgraded());

    // Queries now embed at 8 dimensions against a 2-dimensional collection.
    assert!(store.search("steady", 1).await.is_empty());

    assert_eq!(store.reindex().await.unwrap(), 1);
    assert_eq!(store.identity().await.unwrap().dimensions, 8);
    store.add_documents(strings(&["flaky input"]), None).await.unwrap();
    assert_eq!(store.search("steady", 1).await[0].text, "steady");
}

fn downgrading_adapter_config() -> EmbeddingConfig {
    EmbeddingConfig::single(mock_provider(2, json!({ "fail_on": ["flaky"] }))).with_fallback(
        ProviderConfig::for_provider("trigram")
            .unwrap()
            .with_dimensions(8),
    )
}

#[tokio::test]
async fn test_reindex_policy_migrates_on_append_after_downgrade() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(EmbeddingAdapter::new(downgrading_adapter_config()).await.unwrap());
    let store = open_store(dir.path(), adapter, MismatchPolicy::Reindex).await;

    store.add_documents(strings(&["steady"]), None).await.unwrap();
    assert_eq!(store.identity().await.unwrap().dimensions, 2);

    let added = store
        .add_documents(strings(&["alpha notes", "flaky input", "gamma notes"]), None)
        .await
        .unwrap();
    assert_eq!(added, 3);
    assert_eq!(store.len().await, 4);
    assert_eq!(store.identity().await.unwrap().dimensions, 8);
    assert_eq!(store.search("steady", 1).await[0].text, "steady");

    // The migrated collection is what was saved.
    let reopened = open_store(
        dir.path(),
        Arc::new(
            EmbeddingAdapter::new(EmbeddingConfig::single(
                ProviderConfig::for_provider("trigram")
                    .unwrap()
                    .with_dimensions(8),
            ))
            .await
            .unwrap(),
        ),
        MismatchPolicy::Reject,
    )
    .await;
    assert_eq!(reopened.len().await, 4);
}

#[tokio::test]
async fn test_reindex_policy_migrates_on_search_after_downgrade() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(EmbeddingAdapter::new(downgrading_adapter_config()).await.unwrap());
    let store = open_store(dir.path(), adapter, MismatchPolicy::Reindex).await;

    store
        .add_documents(strings(&["steady", "other words"]), None)
        .await
        .unwrap();

    // Some other caller trips the downgrade.
    let vector = store
        .adapter()
        .embed("flaky query text", EmbeddingRole::Query)
        .await;
    assert_eq!(vector.len(), 8);

    let results = store.search("steady", 1).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "steady");
    assert_eq!(store.identity().await.unwrap().dimensions, 8);
}

#[tokio::test]
async fn test_non_finite_metadata_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(
        dir.path(),
        mock_adapter(2, json!({})).await,
        MismatchPolicy::Reject,
    )
    .await;

    store.add_documents(strings(&["keep me"]), None).await.unwrap();

    let result = store
        .add_documents(
            strings(&["nan row"]),
            Some(vec![Metadata::new().with("confidence", f64::NAN)]),
        )
        .await;
    assert!(matches!(result, Err(AppError::InvalidMetadata { .. })));
    assert_eq!(store.len().await, 1);

    let reopened = open_store(
        dir.path(),
        mock_adapter(2, json!({})).await,
        MismatchPolicy::Reject,
    )
    .await;
    assert_eq!(reopened.len().await, 1);
    assert_eq!(reopened.search("q", 1).await[0].text, "keep me");
}

#[tokio::test]
async fn test_stats_counts_sources() {
    let dir = TempDir::new().unwrap();
    let store = open_store(
        dir.path(),
        mock_adapter(2, json!({})).await,
        MismatchPolicy::Reject,
    )
    .await;

    store
        .add_documents(
            strings(&["a", "b", "c"]),
            Some(vec![
                Metadata::new().with(KEY_SOURCE, "x.pdf"),
                Metadata::new().with(KEY_SOURCE, "x.pdf"),
                Metadata::new().with(KEY_SOURCE, "y.pdf"),
            ]),
        )
        .await
        .unwrap();

    let stats = store.stats().await;
    assert_eq!(stats.records, 3);
    assert_eq!(stats.sources, 2);
    assert_eq!(stats.collection_identity.unwrap().provider, "mock");
    assert_eq!(stats.active_identity.dimensions, 2);
    assert!(stats.file_size_bytes > 0);
}
