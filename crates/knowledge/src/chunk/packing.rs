//! Sentence packing.

use super::{SkipReason, SkippedSpan};
use crate::types::SegmenterConfig;

/// A sentence ready for packing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sentence {
    pub text: String,
    pub words: usize,
    /// Page the sentence starts on
    pub page: u32,
    /// First sentence of a paragraph or list item
    pub unit_start: bool,
    /// Belongs to a list item
    pub in_list: bool,
}

/// A chunk under construction. Its page is the page of its first sentence.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Draft {
    pub page: u32,
    pub section: Option<String>,
    pub sentences: Vec<Sentence>,
    pub words: usize,
}

impl Draft {
    fn new(section: Option<String>) -> Self {
        Self {
            page: 0,
            section,
            sentences: Vec::new(),
            words: 0,
        }
    }

    fn push(&mut self, sentence: Sentence) {
        if self.sentences.is_empty() {
            self.page = sentence.page;
        }
        self.words += sentence.words;
        self.sentences.push(sentence);
    }

    /// Sentences joined by spaces. List items, and whatever follows one,
    /// start on a new line.
    pub fn text(&self) -> String {
        let mut text = String::new();
        let mut previous_in_list = false;
        for (i, sentence) in self.sentences.iter().enumerate() {
            if i > 0 {
                let new_line = sentence.unit_start && (sentence.in_list || previous_in_list);
                text.push(if new_line { '\n' } else { ' ' });
            }
            text.push_str(&sentence.text);
            previous_in_list = sentence.in_list;
        }
        text
    }
}

/// Pack one block of consecutive sentences into `drafts`.
///
/// `drafts` holds the chunks already packed for the same page, so a short
/// trailing run can be folded into the previous chunk of the same section.
/// Anything that cannot be placed within the word bounds goes to `manifest`.
pub(crate) fn pack_block(
    sentences: Vec<Sentence>,
    section: Option<&str>,
    config: &SegmenterConfig,
    drafts: &mut Vec<Draft>,
    manifest: &mut Vec<SkippedSpan>,
) {
    let section = section.map(str::to_string);
    let mut current = Draft::new(section.clone());

    for sentence in sentences {
        if sentence.words > config.max_words {
            finish(std::mem::replace(&mut current, Draft::new(section.clone())), config, drafts, manifest);
            manifest.push(SkippedSpan::new(sentence.page, SkipReason::SentenceTooLong, &sentence.text));
            continue;
        }

        let combined = current.words + sentence.words;
        let reached_target = current.words >= config.target_min_words && combined > config.target_max_words;
        if combined > config.max_words || reached_target {
            finish(std::mem::replace(&mut current, Draft::new(section.clone())), config, drafts, manifest);
        }

        current.push(sentence);
    }

    finish(current, config, drafts, manifest);
}

fn finish(run: Draft, config: &SegmenterConfig, drafts: &mut Vec<Draft>, manifest: &mut Vec<SkippedSpan>) {
    if run.sentences.is_empty() {
        return;
    }

    if run.words >= config.min_words {
        drafts.push(run);
        return;
    }

    match drafts.last_mut() {
        Some(previous) if previous.section == run.section && previous.words + run.words <= config.max_words => {
            for sentence in run.sentences {
                previous.push(sentence);
            }
        }
        _ => manifest.push(SkippedSpan::new(run.page, SkipReason::TooShort, &run.text())),
    }
}
