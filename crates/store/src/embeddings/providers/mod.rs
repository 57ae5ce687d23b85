//! Concrete embedding backends.

pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod trigram;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use trigram::TrigramProvider;
