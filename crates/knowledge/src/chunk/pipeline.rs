//! Segmentation pipeline.

use super::{
    chunk_id,
    detection::TextPatterns,
    packing::{pack_block, Draft, Sentence},
    split_sentences, word_count, Chunk, Segmentation, SkipReason, SkippedSpan,
};
use crate::parser::{PageContent, SourceDocument};
use crate::types::SegmenterConfig;
use manualqa_core::AppResult;
use std::collections::{HashMap, HashSet};

/// Longest line considered as a running header or footer.
const MAX_RUNNING_WORDS: usize = 12;

/// Turns a parsed document into chunks plus a manifest of skipped spans.
pub struct Segmenter {
    config: SegmenterConfig,
    patterns: TextPatterns,
}

/// A paragraph or list item, before sentence splitting.
struct Unit {
    text: String,
    in_list: bool,
    /// Page the first sentence starts on
    page: u32,
    /// Continues a paragraph from the previous page
    continues: bool,
}

impl Unit {
    fn new(text: &str, in_list: bool, page: u32) -> Self {
        Self {
            text: text.to_string(),
            in_list,
            page,
            continues: false,
        }
    }
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> AppResult<Self> {
        Ok(Self {
            config,
            patterns: TextPatterns::new()?,
        })
    }

    /// Segment a whole document. Deterministic for identical input.
    pub fn segment(&self, document: &SourceDocument) -> Segmentation {
        let mut manifest = Vec::new();

        let mut pages: Vec<(u32, Vec<&str>)> = Vec::new();
        for page in &document.pages {
            match &page.content {
                PageContent::Text(text) => pages.push((page.number, text.lines().collect())),
                PageContent::Malformed(reason) => {
                    tracing::warn!("Skipping page {} of {}: {}", page.number, document.name, reason);
                    manifest.push(SkippedSpan::new(page.number, SkipReason::MalformedPage, reason));
                }
            }
        }

        let repeated = self.running_lines(&pages);

        let mut chunks = Vec::new();
        let mut section: Option<String> = None;
        let mut carry: Option<Unit> = None;

        for (i, (number, lines)) in pages.iter().enumerate() {
            let last_page = i + 1 == pages.len();
            let cleaned = self.clean_page(*number, lines, &repeated, &mut manifest);
            let drafts = self.pack_page(*number, &cleaned, last_page, &mut section, &mut carry, &mut manifest);
            self.emit(document, drafts, &mut chunks, &mut manifest);
        }

        tracing::debug!(
            "Segmented {}: {} chunks, {} skipped spans",
            document.name,
            chunks.len(),
            manifest.len()
        );

        Segmentation { chunks, manifest }
    }

    /// Turn drafts into chunks, dropping structural noise.
    fn emit(
        &self,
        document: &SourceDocument,
        drafts: Vec<Draft>,
        chunks: &mut Vec<Chunk>,
        manifest: &mut Vec<SkippedSpan>,
    ) {
        for draft in drafts {
            let text = draft.text();
            if self.patterns.is_structural_noise(&text) {
                manifest.push(SkippedSpan::new(draft.page, SkipReason::StructuralNoise, &text));
                continue;
            }

            chunks.push(Chunk {
                id: chunk_id(&document.content_hash, draft.page, chunks.len()),
                numeric_flag: self.patterns.has_numeric_marker(&text),
                word_count: draft.words,
                source_doc: document.name.clone(),
                page: draft.page,
                section_title: draft.section,
                text,
            });
        }
    }

    /// Normalised lines near the top or bottom of enough pages to count as
    /// running headers or footers.
    fn running_lines(&self, pages: &[(u32, Vec<&str>)]) -> HashSet<String> {
        if pages.len() < self.config.header_min_pages {
            return HashSet::new();
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for (_, lines) in pages {
            let keys: HashSet<String> = self
                .edge_lines(lines)
                .into_iter()
                .filter(|&i| word_count(lines[i]) <= MAX_RUNNING_WORDS)
                .map(|i| normalize_line(lines[i]))
                .collect();
            for key in keys {
                *counts.entry(key).or_default() += 1;
            }
        }

        let needed = (pages.len() as f32 * self.config.header_page_ratio).ceil() as usize;
        counts
            .into_iter()
            .filter(|(_, count)| *count >= needed.max(2))
            .map(|(key, _)| key)
            .collect()
    }

    /// Indexes of the first and last non-blank lines of a page.
    fn edge_lines(&self, lines: &[&str]) -> Vec<usize> {
        let non_blank: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, _)| i)
            .collect();
        let n = self.config.header_scan_lines;
        if non_blank.len() <= n * 2 {
            return non_blank;
        }
        let mut edges = non_blank[..n].to_vec();
        edges.extend_from_slice(&non_blank[non_blank.len() - n..]);
        edges
    }

    /// Drop page numbers and running lines. Blank lines are kept as
    /// paragraph breaks.
    fn clean_page<'a>(
        &self,
        number: u32,
        lines: &[&'a str],
        repeated: &HashSet<String>,
        manifest: &mut Vec<SkippedSpan>,
    ) -> Vec<&'a str> {
        let edges: HashSet<usize> = self.edge_lines(lines).into_iter().collect();
        let mut kept = Vec::with_capacity(lines.len());

        for (i, &line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                kept.push("");
            } else if self.patterns.is_page_number(trimmed) {
                manifest.push(SkippedSpan::new(number, SkipReason::PageNumber, trimmed));
            } else if edges.contains(&i) && repeated.contains(&normalize_line(trimmed)) {
                manifest.push(SkippedSpan::new(number, SkipReason::RunningHeader, trimmed));
            } else {
                kept.push(trimmed);
            }
        }

        kept
    }

    /// Split a cleaned page into blocks at headings and pack each block.
    ///
    /// `section` carries the current heading across pages. `carry` holds a
    /// sentence left unfinished at the bottom of the previous page; it is
    /// joined to the first paragraph here, and an unfinished sentence at the
    /// bottom of this page is handed on the same way unless it is the last.
    fn pack_page(
        &self,
        number: u32,
        lines: &[&str],
        last_page: bool,
        section: &mut Option<String>,
        carry: &mut Option<Unit>,
        manifest: &mut Vec<SkippedSpan>,
    ) -> Vec<Draft> {
        let mut drafts = Vec::new();
        let mut units: Vec<Unit> = Vec::new();
        let mut carried = carry.take();
        let mut open = false;
        let mut at_boundary = true;

        for line in lines {
            if line.is_empty() {
                open = false;
                at_boundary = true;
                continue;
            }

            if at_boundary && self.patterns.is_heading(line) {
                units.extend(carried.take());
                self.pack_units(std::mem::take(&mut units), number, section.as_deref(), &mut drafts, manifest);
                *section = Some(line.to_string());
                open = false;
                continue;
            }

            if self.patterns.is_list_item(line) {
                units.extend(carried.take());
                units.push(Unit::new(line, true, number));
                open = true;
            } else if let Some(mut unit) = carried.take() {
                unit.text.push(' ');
                unit.text.push_str(line);
                units.push(unit);
                open = true;
            } else {
                match units.last_mut() {
                    Some(unit) if open => {
                        unit.text.push(' ');
                        unit.text.push_str(line);
                    }
                    _ => {
                        units.push(Unit::new(line, false, number));
                        open = true;
                    }
                }
            }

            at_boundary = line.ends_with(['.', ':', ';', '?', '!']);
        }

        if let Some(unit) = carried {
            // Nothing on this page to continue into
            if last_page {
                units.push(unit);
            } else {
                *carry = Some(unit);
            }
        } else if !last_page {
            if let Some(last) = units.pop() {
                let (complete, fragment) = split_unfinished(last, number);
                units.extend(complete);
                *carry = fragment;
            }
        }

        self.pack_units(units, number, section.as_deref(), &mut drafts, manifest);
        drafts
    }

    fn pack_units(
        &self,
        units: Vec<Unit>,
        number: u32,
        section: Option<&str>,
        drafts: &mut Vec<Draft>,
        manifest: &mut Vec<SkippedSpan>,
    ) {
        if units.is_empty() {
            return;
        }

        let mut sentences = Vec::new();
        for unit in units {
            for (i, text) in split_sentences(&unit.text).into_iter().enumerate() {
                sentences.push(Sentence {
                    words: word_count(&text),
                    text,
                    page: if i == 0 { unit.page } else { number },
                    unit_start: i == 0 && !unit.continues,
                    in_list: unit.in_list,
                });
            }
        }

        pack_block(sentences, section, &self.config, drafts, manifest);
    }
}

/// Split off a trailing sentence that runs past the end of the page.
///
/// Returns the finished part of the unit, if any, and the unfinished
/// sentence, if any.
fn split_unfinished(unit: Unit, number: u32) -> (Option<Unit>, Option<Unit>) {
    let mut sentences = split_sentences(&unit.text);
    let tail = match sentences.pop() {
        Some(tail) if !ends_sentence(&tail) => tail,
        _ => return (Some(unit), None),
    };

    if sentences.is_empty() {
        return (None, Some(unit));
    }

    let fragment = Unit {
        text: tail,
        in_list: unit.in_list,
        page: number,
        continues: true,
    };
    let complete = Unit {
        text: sentences.join(" "),
        ..unit
    };
    (Some(complete), Some(fragment))
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end_matches(['"', '\'', ')', ']', '\u{201d}', '\u{2019}'])
        .ends_with(['.', ':', ';', '?', '!'])
}

/// Lowercase, digits folded to `#`, whitespace collapsed.
fn normalize_line(line: &str) -> String {
    line.split_whitespace()
        .map(|word| {
            word.chars()
                .map(|c| if c.is_ascii_digit() { '#' } else { c })
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RawPage;

    const PARAGRAPH: &str = "The sponsoring agency prepares the PC-I form for every development project. \
        The form describes the objectives, the cost estimates and the implementation schedule. \
        It is submitted to the Planning Commission for appraisal and review before approval.";

    fn document(pages: &[&str]) -> SourceDocument {
        SourceDocument {
            name: "manual".to_string(),
            content_hash: "hash".to_string(),
            pages: pages
                .iter()
                .enumerate()
                .map(|(i, text)| RawPage {
                    number: i as u32 + 1,
                    content: PageContent::Text(text.to_string()),
                })
                .collect(),
        }
    }

    fn segmenter() -> Segmenter {
        Segmenter::new(SegmenterConfig::default()).unwrap()
    }

    #[test]
    fn test_chunks_within_bounds() {
        let body = format!("{}\n\n{}\n\n{}", PARAGRAPH, PARAGRAPH, PARAGRAPH);
        let result = segmenter().segment(&document(&[&body]));

        assert!(!result.chunks.is_empty());
        for chunk in &result.chunks {
            assert!((35..=65).contains(&chunk.word_count), "{}", chunk.word_count);
            assert_eq!(chunk.word_count, word_count(&chunk.text));
            assert_eq!(chunk.page, 1);
        }
    }

    #[test]
    fn test_sentences_never_split() {
        let body = format!("{} {}", PARAGRAPH, PARAGRAPH);
        let result = segmenter().segment(&document(&[&body]));
        let sentences = split_sentences(PARAGRAPH);
        for chunk in &result.chunks {
            for piece in split_sentences(&chunk.text) {
                assert!(sentences.contains(&piece), "{}", piece);
            }
        }
    }

    #[test]
    fn test_sentence_across_page_break_kept_whole() {
        let first = format!("{} The approval of the competent forum which then", PARAGRAPH);
        let second = format!("records its decision in the minutes of the meeting. {}", PARAGRAPH);
        let result = segmenter().segment(&document(&[&first, &second]));

        let joined = "The approval of the competent forum which then records its decision in the minutes of the meeting.";
        let mut known = split_sentences(PARAGRAPH);
        known.push(joined.to_string());

        assert_eq!(result.chunks.len(), 2);
        for chunk in &result.chunks {
            assert!(chunk.text.ends_with('.'), "chunk ends mid-sentence: {}", chunk.text);
            for piece in split_sentences(&chunk.text) {
                assert!(known.contains(&piece), "{}", piece);
            }
        }
        // The joined sentence starts on page 1
        assert!(result.chunks[1].text.starts_with(joined));
        assert_eq!(result.chunks[1].page, 1);
        assert_ne!(result.chunks[0].id, result.chunks[1].id);
    }

    #[test]
    fn test_unfinished_last_page_kept() {
        let body = format!("{} The approval of the competent forum which then", PARAGRAPH);
        let result = segmenter().segment(&document(&[&body]));

        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].text.ends_with("which then"));
        assert!(result.manifest.is_empty());
    }

    #[test]
    fn test_running_header_and_page_numbers_removed() {
        let pages: Vec<String> = (1..=4)
            .map(|n| format!("Planning Manual 2024\n\n{}\n\n{}", PARAGRAPH, n))
            .collect();
        let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
        let result = segmenter().segment(&document(&refs));

        assert_eq!(result.skipped(SkipReason::RunningHeader).count(), 4);
        assert_eq!(result.skipped(SkipReason::PageNumber).count(), 4);
        for chunk in &result.chunks {
            assert!(!chunk.text.contains("Planning Manual"));
        }
    }

    #[test]
    fn test_section_titles_carry_across_pages() {
        let first = format!("3.2 Appraisal of Projects\n\n{}", PARAGRAPH);
        let result = segmenter().segment(&document(&[&first, PARAGRAPH]));

        assert_eq!(result.chunks.len(), 2);
        for chunk in &result.chunks {
            assert_eq!(chunk.section_title.as_deref(), Some("3.2 Appraisal of Projects"));
        }
        assert_eq!(result.chunks[1].page, 2);
    }

    #[test]
    fn test_malformed_page_reported() {
        let mut doc = document(&[PARAGRAPH, PARAGRAPH]);
        doc.pages[1].content = PageContent::Malformed("invalid UTF-8 at byte 3".to_string());

        let result = segmenter().segment(&doc);
        assert_eq!(result.chunks.len(), 1);
        let skipped: Vec<_> = result.skipped(SkipReason::MalformedPage).collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].page, 2);
    }

    #[test]
    fn test_table_chunk_rejected() {
        let table = "Table 4 lists the approval limits for each approval forum. The departmental committee \
            approves small schemes. The provincial committee approves medium schemes. The central \
            committee approves large schemes. The executive committee approves all the largest schemes.";
        let result = segmenter().segment(&document(&[table]));
        assert!(result.chunks.is_empty());
        assert_eq!(result.skipped(SkipReason::StructuralNoise).count(), 1);
    }

    #[test]
    fn test_numeric_flag() {
        let text = format!("{} The estimated cost is Rs. 50 million.", PARAGRAPH);
        let result = segmenter().segment(&document(&[&text]));
        assert!(result.chunks.iter().any(|c| c.numeric_flag));
    }

    #[test]
    fn test_deterministic() {
        let body = format!("1 Introduction\n\n{}\n\n{}", PARAGRAPH, PARAGRAPH);
        let doc = document(&[&body, &body]);
        let s = segmenter();
        assert_eq!(s.segment(&doc).chunks, s.segment(&doc).chunks);
    }

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line("  Page 12   of 40 "), "page ## of ##");
    }
}
