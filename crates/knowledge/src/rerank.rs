//! Cross-encoder style reranking of retrieval candidates.
//!
//! The HTTP reranker speaks the `/rerank` shape served by text-embeddings
//! inference servers. The lexical reranker needs no service and is the
//! default.

use crate::types::RerankerConfig;
use async_trait::async_trait;
use manualqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Words ignored by the lexical reranker.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "to", "in", "on", "for", "by", "with", "is", "are", "was",
    "were", "be", "it", "its", "this", "that", "what", "which", "who", "how", "when", "where",
    "do", "does", "can", "should", "i", "we", "you", "my", "our", "me", "as", "at", "from",
];

/// Scores query/passage pairs.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    /// One score per passage, in input order. Scores may be unbounded;
    /// callers normalise the whole batch with [`normalize_scores`].
    async fn score(&self, query: &str, passages: &[String]) -> AppResult<Vec<f32>>;
}

/// Map one batch of raw reranker scores into [0, 1], preserving order.
///
/// A batch already in range is kept as is. If any score falls outside
/// [0, 1] the batch is treated as logits and every score goes through the
/// logistic curve. NaN maps to 0.
pub fn normalize_scores(raw: &[f32]) -> Vec<f32> {
    let logits = raw
        .iter()
        .any(|score| !score.is_nan() && !(0.0..=1.0).contains(score));

    raw.iter()
        .map(|&score| {
            if score.is_nan() {
                0.0
            } else if logits {
                1.0 / (1.0 + (-score).exp())
            } else {
                score
            }
        })
        .collect()
}

/// Create a reranker from configuration.
pub fn create_reranker(config: &RerankerConfig, timeout: Duration) -> AppResult<Arc<dyn Reranker>> {
    match config.provider.as_str() {
        "lexical" => Ok(Arc::new(LexicalReranker)),
        "http" => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| AppError::Config("reranker.endpoint is required for the http reranker".to_string()))?;
            Ok(Arc::new(HttpReranker::new(endpoint, timeout)?))
        }
        other => Err(AppError::Config(format!("Unknown reranker provider: {}", other))),
    }
}

/// Share of the query's content words found in the passage.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalReranker;

impl LexicalReranker {
    fn terms(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '-')
            .map(|t| t.trim_matches('-').to_lowercase())
            .filter(|t| !t.is_empty() && !STOPWORDS.contains(&t.as_str()))
            .collect()
    }

    pub fn overlap(query: &str, passage: &str) -> f32 {
        let query_terms = Self::terms(query);
        if query_terms.is_empty() {
            return 0.0;
        }
        let passage_terms = Self::terms(passage);
        let shared = query_terms.intersection(&passage_terms).count();
        shared as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, query: &str, passages: &[String]) -> AppResult<Vec<f32>> {
        Ok(passages.iter().map(|p| Self::overlap(query, p)).collect())
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    score: f32,
}

/// Client for a remote `/rerank` endpoint.
pub struct HttpReranker {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpReranker {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Retrieval(format!("Failed to build reranker client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    fn name(&self) -> &str {
        "http"
    }

    async fn score(&self, query: &str, passages: &[String]) -> AppResult<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/rerank", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&RerankRequest { query, texts: passages })
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Reranker request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Retrieval(format!(
                "Reranker returned status {}",
                response.status()
            )));
        }

        let results: Vec<RerankResult> = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Invalid reranker response: {}", e)))?;

        let mut scores = vec![None; passages.len()];
        for result in results {
            match scores.get_mut(result.index) {
                Some(slot) => *slot = Some(result.score),
                None => {
                    return Err(AppError::Retrieval(format!(
                        "Reranker returned out-of-range index {}",
                        result.index
                    )))
                }
            }
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.ok_or_else(|| AppError::Retrieval(format!("Reranker skipped passage {}", i))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scores_in_range_batch_kept() {
        assert_eq!(normalize_scores(&[0.4, 0.0, 1.0]), vec![0.4, 0.0, 1.0]);
        assert_eq!(normalize_scores(&[f32::NAN, 0.7]), vec![0.0, 0.7]);
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn test_normalize_scores_logits() {
        let scores = normalize_scores(&[4.0, -4.0]);
        assert!(scores[0] > 0.95 && scores[0] <= 1.0);
        assert!(scores[1] < 0.05 && scores[1] >= 0.0);
    }

    #[test]
    fn test_normalize_scores_mixed_batch_keeps_order() {
        let raw = [-0.1, 0.2, 0.9, 1.2];
        let scores = normalize_scores(&raw);

        assert_eq!(scores.len(), raw.len());
        for pair in scores.windows(2) {
            assert!(pair[0] < pair[1], "order must follow raw scores: {:?}", scores);
        }
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        // Logit 0.2 lands above the logistic midpoint
        assert!(scores[1] > 0.5);
    }

    #[tokio::test]
    async fn test_lexical_overlap() {
        let reranker = LexicalReranker;
        let scores = reranker
            .score(
                "Who prepares the PC-I?",
                &[
                    "The PC-I is prepared by the sponsoring agency.".to_string(),
                    "Monitoring is done quarterly.".to_string(),
                ],
            )
            .await
            .unwrap();
        assert_eq!(scores.len(), 2);
        // "prepares" does not match "prepared"; "pc-i" does
        assert!((scores[0] - 0.5).abs() < 1e-6);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn test_create_reranker() {
        let timeout = Duration::from_secs(2);
        assert_eq!(create_reranker(&RerankerConfig::default(), timeout).unwrap().name(), "lexical");

        let missing = RerankerConfig {
            provider: "http".to_string(),
            endpoint: None,
        };
        assert!(create_reranker(&missing, timeout).is_err());

        let unknown = RerankerConfig {
            provider: "magic".to_string(),
            endpoint: None,
        };
        assert!(create_reranker(&unknown, timeout).is_err());
    }
}
