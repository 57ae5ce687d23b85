//! Stats command handler.

use clap::Args;
use docqa_store::{StoreStats, VectorStore};
use std::fmt::Write;

/// Show store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Plain-text summary of store statistics.
fn render_stats(stats: &StoreStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Chunks:    {}", stats.records);
    let _ = writeln!(out, "Sources:   {}", stats.sources);
    match stats.collection_identity {
        Some(ref identity) => {
            let _ = writeln!(out, "Embedded:  {}", identity);
        }
        None => out.push_str("Embedded:  (empty)\n"),
    }
    let _ = writeln!(out, "Provider:  {}", stats.active_identity);
    let _ = writeln!(out, "File:      {}", stats.storage_path.display());
    let _ = writeln!(out, "Size:      {} bytes", stats.file_size_bytes);
    out
}

impl StatsCommand {
    pub async fn execute(&self, store: &VectorStore) -> anyhow::Result<()> {
        tracing::info!("Executing stats command");

        let stats = store.stats().await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        print!("{}", render_stats(&stats));

        Ok(())
    }
}
