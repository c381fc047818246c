//! Vector index abstraction for manual chunks.
//!
//! Retrieval only depends on this trait, so tests and small deployments can
//! use [`MemoryIndex`] while the CLI persists to SQLite.

use crate::chunk::Chunk;
use crate::index::cosine_similarity;
use async_trait::async_trait;
use manualqa_core::AppResult;
use std::cmp::Ordering;
use tokio::sync::RwLock;

/// A chunk with its similarity to the query.
pub type ScoredChunk = (Chunk, f32);

/// Trait for vector index backends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a chunk with its embedding.
    async fn upsert(&self, chunk: &Chunk, embedding: &[f32]) -> AppResult<()>;

    /// Top-k chunks by cosine similarity, best first.
    ///
    /// Ties are broken by page, then chunk id, so results are stable.
    async fn query(&self, embedding: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>>;

    /// Number of stored chunks.
    async fn count(&self) -> AppResult<usize>;

    /// Remove everything.
    async fn reset(&self) -> AppResult<()>;
}

/// Order scored chunks best first with deterministic ties.
pub(crate) fn rank(results: &mut Vec<ScoredChunk>, top_k: usize) {
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.page.cmp(&b.0.page))
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    results.truncate(top_k);
}

/// In-process index.
#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<Vec<(Chunk, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, chunk: &Chunk, embedding: &[f32]) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|(c, _)| c.id == chunk.id) {
            Some(entry) => *entry = (chunk.clone(), embedding.to_vec()),
            None => entries.push((chunk.clone(), embedding.to_vec())),
        }
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>> {
        let entries = self.entries.read().await;
        let mut results: Vec<ScoredChunk> = entries
            .iter()
            .map(|(chunk, stored)| (chunk.clone(), cosine_similarity(embedding, stored)))
            .collect();
        rank(&mut results, top_k);
        Ok(results)
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn reset(&self) -> AppResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, page: u32) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("chunk {}", id),
            source_doc: "manual".to_string(),
            page,
            section_title: None,
            word_count: 2,
            numeric_flag: false,
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let index = MemoryIndex::new();
        index.upsert(&chunk("a", 1), &[1.0, 0.0]).await.unwrap();
        index.upsert(&chunk("b", 2), &[0.0, 1.0]).await.unwrap();
        index.upsert(&chunk("c", 3), &[0.7, 0.7]).await.unwrap();

        let results = index.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "a");
        assert_eq!(results[1].0.id, "c");
    }

    #[tokio::test]
    async fn test_ties_break_by_page() {
        let index = MemoryIndex::new();
        index.upsert(&chunk("late", 9), &[1.0, 0.0]).await.unwrap();
        index.upsert(&chunk("early", 2), &[1.0, 0.0]).await.unwrap();

        let results = index.query(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(results[0].0.id, "early");
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let index = MemoryIndex::new();
        index.upsert(&chunk("a", 1), &[1.0, 0.0]).await.unwrap();
        index.upsert(&chunk("a", 1), &[0.0, 1.0]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        index.reset().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
