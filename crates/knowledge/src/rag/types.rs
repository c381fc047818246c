//! Answering pipeline types.

use crate::chunk::Chunk;
use crate::router::Category;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where an answer came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub doc: String,
    pub page: u32,
}

impl Citation {
    pub fn of(chunk: &Chunk) -> Self {
        Self {
            doc: chunk.source_doc.clone(),
            page: chunk.page,
        }
    }
}

/// A chunk considered for one request, with its scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalCandidate {
    pub chunk: Chunk,
    /// Cosine similarity from the vector index
    pub vector_score: f32,
    /// 0-based position in the vector index results
    pub vector_rank: usize,
    /// Normalised reranker score; `None` when the reranker was unavailable
    pub rerank_score: Option<f32>,
    pub boosted_score: f32,
    pub passes_filters: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// Embedding service or vector index unreachable or too slow.
    #[error("Retrieval unavailable: {0}")]
    Unavailable(String),
}

/// Answer returned to callers of the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Whether retrieval ran for this query
    pub used_rag: bool,
    pub category: Category,
}
