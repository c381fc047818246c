//! Embedding configuration.

use manualqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embedding section of a knowledge base config.
///
/// Changing provider, model or dimensions invalidates the stored vectors;
/// re-ingest with `--reset` afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Ollama base URL; falls back to `OLLAMA_URL`, then localhost
    pub endpoint: Option<String>,

    /// Texts embedded per ingestion batch
    pub batch_size: usize,

    /// Retries per text during ingestion. Queries are never retried.
    pub retries: u32,

    /// Transport timeout for a single embedding request
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            batch_size: 32,
            retries: 3,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !matches!(self.provider.as_str(), "trigram" | "ollama") {
            return Err(AppError::Config(format!(
                "Unknown embedding provider '{}'. Supported providers: trigram, ollama",
                self.provider
            )));
        }
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 || self.timeout_secs == 0 {
            return Err(AppError::Config(
                "embedding.batch_size and embedding.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
