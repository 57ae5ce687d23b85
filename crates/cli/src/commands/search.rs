//! Search command handler.

use clap::Args;
use docqa_store::{SearchResult, VectorStore};
use std::fmt::Write;

/// Find the chunks most relevant to a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Drop results scoring below this cosine similarity
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Plain-text listing of ranked results.
fn render_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No matching chunks\n".to_string();
    }

    let mut out = String::new();
    for (rank, result) in results.iter().enumerate() {
        let label = result.metadata.source_label();
        if label.is_empty() {
            let _ = writeln!(out, "{}. [{:.3}]", rank + 1, result.score);
        } else {
            let _ = writeln!(out, "{}. [{:.3}] {}", rank + 1, result.score, label);
        }
        for line in result.text.lines() {
            let _ = writeln!(out, "   {}", line);
        }
        out.push('\n');
    }
    out
}

impl SearchCommand {
    pub async fn execute(&self, store: &VectorStore) -> anyhow::Result<()> {
        tracing::info!("Executing search command (top_k = {})", self.top_k);

        let results = match self.min_score {
            Some(min_score) => {
                store
                    .search_with_min_score(&self.query, self.top_k, min_score)
                    .await
            }
            None => store.search(&self.query, self.top_k).await,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }

        print!("{}", render_results(&results));
        Ok(())
    }
}
