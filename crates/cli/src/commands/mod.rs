//! Command handlers for the docqa CLI.
//!
//! Each command operates on an opened vector store.

pub mod clear;
pub mod ingest;
pub mod search;
pub mod stats;

pub use clear::ClearCommand;
pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;
