//! Line and chunk classification used by the segmenter and by retrieval
//! filtering.

use manualqa_core::{AppError, AppResult};
use regex::Regex;

/// Structural prefixes that mark tables, figures and front matter.
const NOISE_PREFIXES: &[&str] = &["table", "figure", "annexure", "annex", "list of", "contents"];

/// Compiled patterns for page cleaning and chunk tagging.
///
/// Build once and share; all methods are read-only.
#[derive(Debug, Clone)]
pub struct TextPatterns {
    page_number: Regex,
    numbered_heading: Regex,
    list_item: Regex,
    numeric_marker: Regex,
    numeric_token: Regex,
}

impl TextPatterns {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            page_number: compile(
                r"(?i)^(?:page\s*)?[-–—(\[]?\s*(?:\d{1,4}|[ivx]{1,6})\s*[-–—)\]]?(?:\s*(?:of|/)\s*\d{1,4})?$",
            )?,
            numbered_heading: compile(
                r"^(?:(?:chapter|section|part)\s+)?(?:\d{1,2}(?:\.\d{1,2}){0,3}\.?|[IVX]{1,5}\.)\s+\p{Lu}[^.!?;:]{0,80}$",
            )?,
            list_item: compile(
                r"^(?:[-•*·▪◦]|\(?[a-z]\)|\(?[ivx]{1,4}\)|\(?\d{1,2}[.)])\s+",
            )?,
            numeric_marker: compile(
                r"(?i)\brs\.|\bpkr\b|\$|%|\b(?:million|billion|crore|lakh|lakhs|percent)\b|\b\d[\d,]*(?:\.\d+)?\s*(?:km|kg|mw|kw|kv|mm|cm|ha|hectares?|acres?|tons?|tonnes?|days?|weeks?|months?|years?|hours?|units?|meters?|metres?)\b",
            )?,
            numeric_token: compile(r"^[(\[]?[-+]?(?:rs\.?|pkr|\$)?\d[\d,]*(?:\.\d+)?%?[)\],.;:]?$")?,
        })
    }

    /// Bare page-number lines: `12`, `Page 12`, `- 12 -`, `xii`, `3 of 40`.
    pub fn is_page_number(&self, line: &str) -> bool {
        self.page_number.is_match(line.trim())
    }

    /// Section headings: numbered headings or short ALL CAPS / Title Case
    /// lines without terminal punctuation.
    pub fn is_heading(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() || self.is_list_item(line) || self.is_page_number(line) {
            return false;
        }
        if self.numbered_heading.is_match(line) {
            return true;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() || words.len() > 10 {
            return false;
        }
        if line.ends_with(['.', ',', ';', ':', '?', '!']) {
            return false;
        }

        let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() < 3 {
            return false;
        }

        let all_caps = letters.iter().all(|c| c.is_uppercase());
        if all_caps {
            return true;
        }

        // Title Case: every word of four or more letters is capitalised
        words.len() <= 8
            && words
                .iter()
                .filter(|w| w.chars().filter(|c| c.is_alphabetic()).count() >= 4)
                .all(|w| w.chars().find(|c| c.is_alphabetic()).is_some_and(char::is_uppercase))
            && words[0].chars().find(|c| c.is_alphabetic()).is_some_and(char::is_uppercase)
    }

    /// Bullet or enumerated list line.
    pub fn is_list_item(&self, line: &str) -> bool {
        self.list_item.is_match(line.trim_start())
    }

    /// Mentions a currency, percentage, large-number word or a quantity with unit.
    pub fn has_numeric_marker(&self, text: &str) -> bool {
        self.numeric_marker.is_match(text)
    }

    /// Share of whitespace tokens that are numbers or amounts.
    pub fn numeric_ratio(&self, text: &str) -> f32 {
        let tokens: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        if tokens.is_empty() {
            return 0.0;
        }
        let numeric = tokens
            .iter()
            .filter(|t| self.numeric_token.is_match(t))
            .count();
        numeric as f32 / tokens.len() as f32
    }

    /// Tables, figures, front matter and list-dominated text.
    ///
    /// Works on stored chunk text as well as on freshly packed text: list
    /// items are kept on their own lines.
    pub fn is_structural_noise(&self, text: &str) -> bool {
        let trimmed = text.trim_start();
        let lower = trimmed.to_lowercase();
        let starts_with_marker = NOISE_PREFIXES.iter().any(|prefix| {
            lower.starts_with(prefix)
                && lower[prefix.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_alphabetic())
        });
        if starts_with_marker {
            return true;
        }

        if self.numeric_ratio(text) > 0.5 {
            return true;
        }

        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() >= 2 {
            let list_lines = lines.iter().filter(|l| self.is_list_item(l)).count();
            if list_lines * 2 > lines.len() {
                return true;
            }
        }

        false
    }
}

fn compile(pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| AppError::Knowledge(format!("Invalid text pattern {}: {}", pattern, e)))
}
