//! Clear command handler.

use clap::Args;
use docqa_store::VectorStore;

/// Remove every chunk and the persisted file
#[derive(Args, Debug)]
pub struct ClearCommand {}

impl ClearCommand {
    pub async fn execute(&self, store: &VectorStore) -> anyhow::Result<()> {
        tracing::info!("Executing clear command");

        let records = store.len().await;
        store.clear().await;

        println!("Cleared {} chunks", records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::mock_store;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_execute_empties_store_and_file() {
        let dir = TempDir::new().unwrap();
        let store = mock_store(dir.path()).await;
        store
            .add_documents(vec!["cats".to_string(), "stock".to_string()], None)
            .await
            .unwrap();
        assert!(store.config().db_path().exists());

        ClearCommand {}.execute(&store).await.unwrap();
        assert!(store.is_empty().await);
        assert!(!store.config().db_path().exists());

        // Clearing again is harmless.
        ClearCommand {}.execute(&store).await.unwrap();
        assert!(mock_store(dir.path()).await.is_empty().await);
    }
}
