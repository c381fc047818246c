//! Embedding capability.
//!
//! Chunks and queries are embedded through [`EmbeddingProvider`]. Two
//! implementations ship: Ollama over HTTP and a deterministic trigram hasher
//! for offline use and tests.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
