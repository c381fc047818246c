//! Deterministic trigram embeddings for offline use.

use crate::embeddings::provider::EmbeddingProvider;
use manualqa_core::AppResult;
use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how", "does", "do", "can", "shall", "will",
];

/// Feature-hashed bag of character trigrams and whole words.
///
/// Not semantic, but stable across runs and platforms, and texts sharing
/// vocabulary land close together. Output is L2-normalised.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, feature: &str, seed: u64) -> usize {
        let hash = feature
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(1_099_511_628_211).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lower = text.to_lowercase();
        let mut term_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .map(|w| w.trim_matches('-'))
            .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(w))
        {
            *term_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in term_freq {
            let weight = (freq as f32).sqrt();

            let padded: Vec<char> = format!("#{}#", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(&trigram, 0xcbf2_9ce4_8422_2325)] += weight;
            }

            vector[self.bucket(word, 0x8422_2325_cbf2_9ce4)] += 2.0 * weight;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}
