//! Knowledge base type definitions.

use crate::chunk::SkippedSpan;
use crate::embeddings::EmbeddingConfig;
use chrono::{DateTime, Utc};
use manualqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a knowledge base.
///
/// Stored at `.manualqa/knowledge/<base>/config.yaml`. Every section falls
/// back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub segmenter: SegmenterConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub reranker: RerankerConfig,
}

/// Chunk sizing and page cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Hard lower bound on chunk word count
    pub min_words: usize,
    /// Hard upper bound on chunk word count
    pub max_words: usize,
    /// Packing stops once a chunk reaches this size and the next sentence
    /// would push it past `target_max_words`
    pub target_min_words: usize,
    pub target_max_words: usize,
    /// Running header detection needs at least this many pages
    pub header_min_pages: usize,
    /// Fraction of pages a line must repeat on to count as a running header
    pub header_page_ratio: f32,
    /// Lines scanned at the top and bottom of each page for running headers
    pub header_scan_lines: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_words: 35,
            max_words: 65,
            target_min_words: 40,
            target_max_words: 55,
            header_min_pages: 3,
            header_page_ratio: 0.5,
            header_scan_lines: 3,
        }
    }
}

/// Retrieval, filtering and boosting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Nearest neighbours requested from the vector index
    pub top_k: usize,
    /// Deadline for the embedding call and for the index query, each
    pub index_timeout_ms: u64,
    /// Deadline for the reranker before falling back to vector scores
    pub rerank_timeout_ms: u64,
    pub min_words: usize,
    pub max_words: usize,
    /// Candidates below this boosted score are dropped
    pub min_score: f32,
    /// Added per matched retrieval hint
    pub hint_boost: f32,
    /// Multiplier on the base score for numeric matches
    pub numeric_boost: f32,
    pub strict_top_n: usize,
    pub normal_top_n: usize,
    pub max_context_words: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 20,
            index_timeout_ms: 2000,
            rerank_timeout_ms: 2000,
            min_words: 35,
            max_words: 65,
            min_score: 0.30,
            hint_boost: 0.15,
            numeric_boost: 0.5,
            strict_top_n: 2,
            normal_top_n: 6,
            max_context_words: 330,
        }
    }
}

impl RetrievalConfig {
    pub fn index_timeout(&self) -> Duration {
        Duration::from_millis(self.index_timeout_ms)
    }

    pub fn rerank_timeout(&self) -> Duration {
        Duration::from_millis(self.rerank_timeout_ms)
    }
}

/// Generation budget and answer shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub primary_timeout_ms: u64,
    pub secondary_timeout_ms: u64,
    /// Overall per-request budget, retrieval included
    pub request_timeout_ms: u64,
    /// Retry the primary once on a non-timeout fault
    pub retry_primary: bool,
    /// Conversation turns rendered into the prompt
    pub history_turns: usize,
    pub max_answer_words: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            primary_timeout_ms: 8000,
            secondary_timeout_ms: 8000,
            request_timeout_ms: 15000,
            retry_primary: true,
            history_turns: 3,
            max_answer_words: 80,
        }
    }
}

impl GenerationConfig {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn secondary_timeout(&self) -> Duration {
        Duration::from_millis(self.secondary_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Session memory limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Turns kept per session
    pub capacity: usize,
    /// Idle time after which a session is dropped
    pub ttl_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 6,
            ttl_secs: 30 * 60,
        }
    }
}

impl MemoryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Cross-encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    /// "lexical" or "http"
    pub provider: String,
    /// Base URL of a TEI-compatible `/rerank` endpoint
    pub endpoint: Option<String>,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            provider: "lexical".to_string(),
            endpoint: None,
        }
    }
}

impl KnowledgeBaseConfig {
    /// Reject settings that would break the pipeline's invariants.
    pub fn validate(&self) -> AppResult<()> {
        let s = &self.segmenter;
        if s.min_words == 0 {
            return Err(invalid("segmenter.min_words must be positive"));
        }
        if !(s.min_words <= s.target_min_words
            && s.target_min_words <= s.target_max_words
            && s.target_max_words <= s.max_words)
        {
            return Err(invalid(
                "segmenter bounds must satisfy min_words <= target_min_words <= target_max_words <= max_words",
            ));
        }
        if !(0.0..=1.0).contains(&s.header_page_ratio) {
            return Err(invalid("segmenter.header_page_ratio must be within [0, 1]"));
        }

        let r = &self.retrieval;
        if r.top_k == 0 || r.strict_top_n == 0 || r.normal_top_n == 0 {
            return Err(invalid("retrieval top_k, strict_top_n and normal_top_n must be positive"));
        }
        if r.min_words > r.max_words {
            return Err(invalid("retrieval.min_words cannot exceed retrieval.max_words"));
        }
        if !(0.0..=1.0).contains(&r.min_score) {
            return Err(invalid("retrieval.min_score must be within [0, 1]"));
        }
        if r.hint_boost < 0.0 || r.numeric_boost < 0.0 {
            return Err(invalid("retrieval boosts cannot be negative"));
        }
        if r.index_timeout_ms == 0 || r.rerank_timeout_ms == 0 {
            return Err(invalid("retrieval timeouts must be positive"));
        }
        if r.max_context_words == 0 {
            return Err(invalid("retrieval.max_context_words must be positive"));
        }

        let g = &self.generation;
        if g.primary_timeout_ms == 0 || g.secondary_timeout_ms == 0 || g.request_timeout_ms == 0 {
            return Err(invalid("generation timeouts must be positive"));
        }
        if g.max_answer_words == 0 {
            return Err(invalid("generation.max_answer_words must be positive"));
        }

        if self.memory.capacity == 0 || self.memory.ttl_secs == 0 {
            return Err(invalid("memory capacity and ttl_secs must be positive"));
        }

        match self.reranker.provider.as_str() {
            "lexical" => {}
            "http" if self.reranker.endpoint.is_some() => {}
            "http" => return Err(invalid("reranker.endpoint is required for the http reranker")),
            other => {
                return Err(invalid(&format!(
                    "unknown reranker provider '{}'. Supported: lexical, http",
                    other
                )))
            }
        }

        self.embedding.validate()
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(format!("Invalid knowledge base config: {}", message))
}

/// Options for the ingest operation.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Knowledge base name
    pub base_name: String,

    /// Text file with form-feed page breaks, or a directory of page files
    pub path: PathBuf,

    /// Name used in citations; defaults to the file or directory stem
    pub doc_name: Option<String>,

    /// Drop everything in the base before ingesting
    pub reset: bool,
}

/// Outcome of an ingest operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub base_name: String,
    pub document: String,
    /// SHA-256 of the source bytes
    pub content_hash: String,
    pub pages: usize,
    pub chunks_count: usize,
    /// True when the same content was already indexed and nothing was done
    pub already_indexed: bool,
    pub skipped: Vec<SkippedSpan>,
    pub duration_secs: f64,
}

/// An ingested source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub name: String,
    pub content_hash: String,
    pub pages: usize,
    pub chunks_count: usize,
    pub ingested_at: DateTime<Utc>,
}

/// Statistics for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStats {
    pub base_name: String,
    pub documents: Vec<DocumentRecord>,
    pub chunks_count: usize,
    pub db_size_bytes: u64,
    pub last_ingest_at: Option<DateTime<Utc>>,
}
