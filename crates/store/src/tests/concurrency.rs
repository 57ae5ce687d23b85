//! Readers and writers sharing one store across threads.

use super::{mock_adapter, open_store, strings};
use crate::config::MismatchPolicy;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const BATCH: usize = 5;

fn batch(round: usize) -> Vec<String> {
    (0..BATCH)
        .map(|i| format!("round {} chunk {} about cats", round, i))
        .collect()
}

fn script() -> serde_json::Value {
    json!({
        "rules": [
            { "contains": "chunk 0", "vector": [1.0, 0.0, 0.0] },
            { "contains": "chunk 1", "vector": [0.0, 1.0, 0.0] },
            { "contains": "chunk 2", "vector": [0.0, 0.0, 1.0] },
            { "contains": "chunk 3", "vector": [1.0, 1.0, 0.0] },
            { "contains": "cats", "vector": [1.0, 0.5, 0.25] }
        ]
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_batches() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        open_store(dir.path(), mock_adapter(3, script()).await, MismatchPolicy::Reject).await,
    );

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for round in 0..10 {
                let added = store.add_documents(batch(round), None).await.unwrap();
                assert_eq!(added, BATCH);
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..40 {
                    let results = store.search("cats", 4).await;
                    assert!(results.len() <= 4);
                    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
                    assert_eq!(store.len().await % BATCH, 0);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(store.len().await, 10 * BATCH);
    assert_eq!(store.search("cats", 100).await.len(), 10 * BATCH);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clear_interleaved_with_appends() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        open_store(dir.path(), mock_adapter(3, script()).await, MismatchPolicy::Reject).await,
    );

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for round in 0..8 {
                store.add_documents(batch(round), None).await.unwrap();
            }
        })
    };

    let clearer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for _ in 0..4 {
                store.clear().await;
                assert_eq!(store.len().await % BATCH, 0);
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    clearer.await.unwrap();

    let remaining = store.len().await;
    assert_eq!(remaining % BATCH, 0);

    // Whatever survived is also what a fresh handle sees on disk.
    let reopened = open_store(dir.path(), mock_adapter(3, script()).await, MismatchPolicy::Reject).await;
    assert_eq!(reopened.len().await, remaining);
    assert!(store.search("unrelated", 3).await.len() <= 3);
}
