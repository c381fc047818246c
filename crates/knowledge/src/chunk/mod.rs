//! Document segmentation.
//!
//! Turns extracted page text into bounded, sentence-respecting chunks:
//! - running headers, footers and page numbers are dropped
//! - section headings are tracked and attached to every chunk
//! - sentences are packed into chunks without ever being split
//! - tabular and list-dominated chunks are rejected
//! - chunks quoting amounts or quantities are flagged numeric
//!
//! Everything that does not become a chunk is reported in the manifest.

mod detection;
mod metadata;
mod packing;
mod pipeline;
mod sentences;

pub use detection::TextPatterns;
pub use metadata::{calculate_hash, chunk_id};
pub use pipeline::Segmenter;
pub use sentences::{split_sentences, word_count};

use serde::{Deserialize, Serialize};

/// A retrievable span of the manual. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Derived from (document hash, page, position)
    pub id: String,

    pub text: String,

    /// Document name used in citations
    pub source_doc: String,

    /// 1-based page number
    pub page: u32,

    /// Nearest preceding section heading
    pub section_title: Option<String>,

    pub word_count: usize,

    /// Mentions an amount, percentage or quantity
    pub numeric_flag: bool,
}

/// Why a span did not become a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SentenceTooLong,
    TooShort,
    StructuralNoise,
    MalformedPage,
    RunningHeader,
    PageNumber,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SentenceTooLong => "sentence_too_long",
            Self::TooShort => "too_short",
            Self::StructuralNoise => "structural_noise",
            Self::MalformedPage => "malformed_page",
            Self::RunningHeader => "running_header",
            Self::PageNumber => "page_number",
        }
    }
}

/// Manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSpan {
    pub page: u32,
    pub reason: SkipReason,
    /// First words of the skipped text
    pub excerpt: String,
}

impl SkippedSpan {
    pub(crate) fn new(page: u32, reason: SkipReason, text: &str) -> Self {
        const EXCERPT_WORDS: usize = 12;
        let mut words = text.split_whitespace();
        let mut excerpt = words.by_ref().take(EXCERPT_WORDS).collect::<Vec<_>>().join(" ");
        if words.next().is_some() {
            excerpt.push_str(" ...");
        }
        Self {
            page,
            reason,
            excerpt,
        }
    }
}

/// Result of segmenting one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Segmentation {
    pub chunks: Vec<Chunk>,
    pub manifest: Vec<SkippedSpan>,
}

impl Segmentation {
    /// Manifest entries with the given reason.
    pub fn skipped(&self, reason: SkipReason) -> impl Iterator<Item = &SkippedSpan> {
        self.manifest.iter().filter(move |s| s.reason == reason)
    }
}
