//! Two-stage retrieval: vector search, hard filters, rerank, boost.

use super::types::{RetrievalCandidate, RetrievalError};
use crate::chunk::TextPatterns;
use crate::embeddings::EmbeddingProvider;
use crate::rerank::{normalize_scores, Reranker};
use crate::router::{HintVocabulary, RetrievalHint, RetrievalMode};
use crate::types::RetrievalConfig;
use crate::vector_index::{ScoredChunk, VectorIndex};
use manualqa_core::AppResult;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::timeout;

/// Hints that are matched against chunk vocabulary. Numeric uses the
/// chunk's flag instead.
const CONTENT_HINTS: [RetrievalHint; 3] = [
    RetrievalHint::Procedure,
    RetrievalHint::Formula,
    RetrievalHint::Monitoring,
];

/// Final score of a candidate.
///
/// Both boosts are computed from `base` and added once; the clamp comes
/// last.
pub fn boosted_score(base: f32, matched_hints: usize, numeric: bool, config: &RetrievalConfig) -> f32 {
    let base = base.clamp(0.0, 1.0);
    let mut score = base + config.hint_boost * matched_hints as f32;
    if numeric {
        score += config.numeric_boost * base;
    }
    score.min(1.0)
}

/// Selects the minimal evidence set for a query.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
    vocabulary: Arc<HintVocabulary>,
    patterns: TextPatterns,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
        vocabulary: Arc<HintVocabulary>,
        config: RetrievalConfig,
    ) -> AppResult<Self> {
        Ok(Self {
            embedder,
            index,
            reranker,
            vocabulary,
            patterns: TextPatterns::new()?,
            config,
        })
    }

    /// Chunks supporting an answer to `query`, best first.
    ///
    /// An empty result means nothing relevant was found. An error means the
    /// embedding service or the index could not be reached in time; it is
    /// never retried here.
    pub async fn retrieve(
        &self,
        query: &str,
        hints: &BTreeSet<RetrievalHint>,
        mode: RetrievalMode,
    ) -> Result<Vec<RetrievalCandidate>, RetrievalError> {
        let neighbours = self.search(query).await?;
        let fetched = neighbours.len();

        let mut candidates: Vec<RetrievalCandidate> = self
            .filter(neighbours)
            .into_iter()
            .filter(|c| c.passes_filters)
            .collect();
        let filtered = candidates.len();

        if candidates.is_empty() {
            tracing::info!(fetched, "No candidates survived filtering");
            return Ok(Vec::new());
        }

        self.rerank(query, &mut candidates).await;

        for candidate in &mut candidates {
            let base = candidate
                .rerank_score
                .unwrap_or_else(|| candidate.vector_score.clamp(0.0, 1.0));
            let matched = CONTENT_HINTS
                .iter()
                .filter(|hint| hints.contains(*hint) && self.vocabulary.matches(**hint, &candidate.chunk.text))
                .count();
            let numeric = hints.contains(&RetrievalHint::Numeric) && candidate.chunk.numeric_flag;
            candidate.boosted_score = boosted_score(base, matched, numeric, &self.config);
        }

        candidates.retain(|c| c.boosted_score >= self.config.min_score);
        candidates.sort_by(|a, b| {
            b.boosted_score
                .partial_cmp(&a.boosted_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.vector_rank.cmp(&b.vector_rank))
                .then_with(|| a.chunk.page.cmp(&b.chunk.page))
        });

        let selected = self.select(candidates, mode);

        tracing::info!(
            fetched,
            filtered,
            selected = selected.len(),
            top_score = selected.first().map(|c| c.boosted_score).unwrap_or(0.0),
            "Retrieval complete"
        );

        Ok(selected)
    }

    async fn search(&self, query: &str) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let limit = self.config.index_timeout();

        let embedding = match timeout(limit, self.embedder.embed(query)).await {
            Ok(Ok(embedding)) => embedding,
            Ok(Err(e)) => return Err(RetrievalError::Unavailable(format!("embedding failed: {}", e))),
            Err(_) => return Err(RetrievalError::Unavailable("embedding timed out".to_string())),
        };

        match timeout(limit, self.index.query(&embedding, self.config.top_k)).await {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(e)) => Err(RetrievalError::Unavailable(format!("vector query failed: {}", e))),
            Err(_) => Err(RetrievalError::Unavailable("vector query timed out".to_string())),
        }
    }

    /// Mark candidates that fail the word bounds, look like structural
    /// noise, or repeat a better-ranked candidate.
    fn filter(&self, neighbours: Vec<ScoredChunk>) -> Vec<RetrievalCandidate> {
        let mut kept: Vec<String> = Vec::new();

        neighbours
            .into_iter()
            .enumerate()
            .map(|(rank, (chunk, score))| {
                let in_bounds = (self.config.min_words..=self.config.max_words).contains(&chunk.word_count);
                let clean = !self.patterns.is_structural_noise(&chunk.text);

                let mut passes = in_bounds && clean;
                if passes {
                    let key = dedup_key(&chunk.text);
                    if kept.iter().any(|k| k.contains(&key) || key.contains(k.as_str())) {
                        passes = false;
                    } else {
                        kept.push(key);
                    }
                }

                RetrievalCandidate {
                    chunk,
                    vector_score: score,
                    vector_rank: rank,
                    rerank_score: None,
                    boosted_score: 0.0,
                    passes_filters: passes,
                }
            })
            .collect()
    }

    /// Attach normalised reranker scores. On failure the candidates keep
    /// `rerank_score = None` and fall back to their vector score.
    async fn rerank(&self, query: &str, candidates: &mut [RetrievalCandidate]) {
        let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();

        match timeout(self.config.rerank_timeout(), self.reranker.score(query, &texts)).await {
            Ok(Ok(scores)) if scores.len() == candidates.len() => {
                for (candidate, score) in candidates.iter_mut().zip(normalize_scores(&scores)) {
                    candidate.rerank_score = Some(score);
                }
            }
            Ok(Ok(scores)) => tracing::warn!(
                reranker = self.reranker.name(),
                expected = candidates.len(),
                got = scores.len(),
                "Reranker returned the wrong number of scores, falling back to vector scores"
            ),
            Ok(Err(e)) => tracing::warn!(
                reranker = self.reranker.name(),
                "Reranker failed, falling back to vector scores: {}",
                e
            ),
            Err(_) => tracing::warn!(
                reranker = self.reranker.name(),
                "Reranker timed out, falling back to vector scores"
            ),
        }
    }

    /// Top N within the context word budget. The best candidate is always
    /// kept.
    fn select(&self, candidates: Vec<RetrievalCandidate>, mode: RetrievalMode) -> Vec<RetrievalCandidate> {
        let limit = match mode {
            RetrievalMode::Strict => self.config.strict_top_n,
            RetrievalMode::Normal => self.config.normal_top_n,
        };

        let mut selected = Vec::new();
        let mut words = 0;
        for candidate in candidates {
            if selected.len() >= limit {
                break;
            }
            if !selected.is_empty() && words + candidate.chunk.word_count > self.config.max_context_words {
                break;
            }
            words += candidate.chunk.word_count;
            selected.push(candidate);
        }
        selected
    }
}

/// Lower-case alphanumeric words, single-spaced.
fn dedup_key(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
