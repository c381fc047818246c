//! Answer post-processing.
//!
//! Enforces the output contract on raw model text: no echoed prefixes, no
//! leaked instructions, a word budget cut at a sentence end, and exactly one
//! citation line. Running it twice gives the same text.

use super::types::Citation;
use crate::chunk::{split_sentences, word_count};
use manualqa_core::{AppError, AppResult};
use manualqa_prompt::guardrails::keys;
use manualqa_prompt::GuardrailTemplates;
use regex::{Regex, RegexSet};
use std::collections::BTreeMap;

/// Answer prefixes a model tends to echo.
const PREFIX: &str = r"(?i)^\s*(?:final answer|answer|response|reply|assistant|a)\s*:\s*";

/// Whole lines that must never reach the user.
const LEAKED_LINES: &[&str] = &[
    // model-written citations; the formatter adds its own
    r"(?i)^\s*(?:sources?|citations?|references?)\s*:",
    // prompt block labels
    r"(?i)^\s*(?:context|manual excerpts?|excerpts?|earlier conversation|conversation|history|question|query|rules|instructions|q)\s*:",
    r"(?i)^\s*\[(?:excerpt|context|doc(?:ument)?)\b[^\]]*\]",
    r"(?i)^\s*\(page \d+[^)]*\)\s*$",
    // structural meta-headings
    r"^\s*#{1,6}\s",
    r"^\s*\*\*[^*]+\*\*\s*:?\s*$",
    r"(?i)^\s*(?:summary|overview|key points|details|note|explanation)\s*:?\s*$",
    // instruction leakage
    r"(?i)\bsystem (?:prompt|message|instructions?)\b",
    r"(?i)\b(?:my|these|the above) (?:rules|instructions)\b",
];

/// Sentences that leak instructions inside otherwise valid prose.
const LEAKED_SENTENCE: &str =
    r"(?i)\b(?:system prompt|my instructions|i (?:was|am) instructed|i am not allowed to reveal|as an ai\b|language model)";

/// Model phrasings meaning the excerpts did not hold the answer.
const NOT_FOUND: &str = r"(?i)\bnot found in the manual\b|\b(?:the )?(?:manual|excerpts?|context)(?: provided)? (?:does|do) not (?:contain|mention|cover|include|specify|provide)\b|\bno (?:relevant )?information (?:is )?(?:available|provided|found)\b";

/// Formatted answer and the citations it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Post-processor for model answers.
#[derive(Debug, Clone)]
pub struct AnswerFormatter {
    max_words: usize,
    not_found: String,
    fallback: String,
    prefix: Regex,
    leaked_lines: RegexSet,
    leaked_sentence: Regex,
    not_found_signal: Regex,
}

impl AnswerFormatter {
    pub fn new(max_words: usize, templates: &GuardrailTemplates) -> AppResult<Self> {
        Ok(Self {
            max_words,
            not_found: templates.lookup(&[keys::NOT_FOUND]).to_string(),
            fallback: templates.lookup(&[keys::FORMAT_FALLBACK]).to_string(),
            prefix: compile(PREFIX)?,
            leaked_lines: RegexSet::new(LEAKED_LINES)
                .map_err(|e| AppError::Other(format!("Invalid leakage patterns: {}", e)))?,
            leaked_sentence: compile(LEAKED_SENTENCE)?,
            not_found_signal: compile(NOT_FOUND)?,
        })
    }

    /// Fixed answer used when the excerpts do not hold the answer.
    pub fn not_found(&self) -> &str {
        &self.not_found
    }

    /// Apply the output contract to `raw`.
    pub fn format(&self, raw: &str, citations: &[Citation]) -> FormattedAnswer {
        let body = self.clean(raw);

        if self.not_found_signal.is_match(&body) {
            return FormattedAnswer {
                text: self.not_found.clone(),
                citations: Vec::new(),
            };
        }

        let body = match self.truncate(&body) {
            Some(body) if !body.is_empty() => body,
            _ => {
                tracing::warn!("Answer failed format checks, substituting fallback");
                self.fallback.clone()
            }
        };

        let mut cited: Vec<Citation> = citations.to_vec();
        cited.sort();
        cited.dedup();

        let text = match citation_line(&cited) {
            Some(line) => format!("{}\n{}", body, line),
            None => body,
        };

        FormattedAnswer { text, citations: cited }
    }

    /// Strip prefixes, drop leaked lines and sentences, collapse whitespace.
    fn clean(&self, raw: &str) -> String {
        let mut kept: Vec<String> = Vec::new();
        for line in raw.lines() {
            let mut line = line.trim();
            while let Some(m) = self.prefix.find(line) {
                if m.end() == 0 {
                    break;
                }
                line = line[m.end()..].trim_start();
            }
            if line.is_empty() || self.leaked_lines.is_match(line) {
                continue;
            }
            kept.push(line.to_string());
        }

        let collapsed = kept.join(" ").split_whitespace().collect::<Vec<_>>().join(" ");

        split_sentences(&collapsed)
            .into_iter()
            .filter(|s| !self.leaked_sentence.is_match(s))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whole sentences up to the word budget. `None` when even the first
    /// sentence is over budget.
    fn truncate(&self, body: &str) -> Option<String> {
        if word_count(body) <= self.max_words {
            return Some(body.to_string());
        }

        let mut kept: Vec<String> = Vec::new();
        let mut words = 0;
        for sentence in split_sentences(body) {
            let n = word_count(&sentence);
            if words + n > self.max_words {
                break;
            }
            words += n;
            kept.push(sentence);
        }

        if kept.is_empty() {
            None
        } else {
            Some(kept.join(" "))
        }
    }
}

/// `Source: <doc> p.3, p.7`, documents separated by `; `.
fn citation_line(citations: &[Citation]) -> Option<String> {
    if citations.is_empty() {
        return None;
    }

    let mut by_doc: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
    for citation in citations {
        by_doc.entry(citation.doc.as_str()).or_default().push(citation.page);
    }

    let parts: Vec<String> = by_doc
        .into_iter()
        .map(|(doc, pages)| {
            let pages: Vec<String> = pages.iter().map(|p| format!("p.{}", p)).collect();
            format!("{} {}", doc, pages.join(", "))
        })
        .collect();

    Some(format!("Source: {}", parts.join("; ")))
}

fn compile(pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern).map_err(|e| AppError::Other(format!("Invalid answer pattern {}: {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> AnswerFormatter {
        AnswerFormatter::new(80, &GuardrailTemplates::default()).unwrap()
    }

    fn cite(page: u32) -> Vec<Citation> {
        vec![Citation {
            doc: "Manual".to_string(),
            page,
        }]
    }

    fn source_lines(text: &str) -> usize {
        text.lines().filter(|l| l.starts_with("Source:")).count()
    }

    #[test]
    fn test_prefixes_stripped() {
        let out = formatter().format("Answer: Final answer: The PC-I is prepared by the agency.", &cite(4));
        assert_eq!(out.text, "The PC-I is prepared by the agency.\nSource: Manual p.4");
    }

    #[test]
    fn test_leaked_lines_removed() {
        let raw = "## Summary\nThe PC-I is approved by the forum.\nSource: Manual page 9\nAs per my instructions, I only use excerpts.\n[Excerpt 1] (page 4)";
        let out = formatter().format(raw, &cite(4));
        assert_eq!(out.text, "The PC-I is approved by the forum.\nSource: Manual p.4");
        assert_eq!(source_lines(&out.text), 1);
    }

    #[test]
    fn test_leaked_sentence_removed() {
        let raw = "The PC-I is approved by the forum. As an AI language model I follow rules.";
        let out = formatter().format(raw, &[]);
        assert_eq!(out.text, "The PC-I is approved by the forum.");
    }

    #[test]
    fn test_truncates_at_sentence_end() {
        let sentence = "The sponsoring agency prepares the form and submits it for review.";
        let raw = vec![sentence; 10].join(" ");
        let out = formatter().format(&raw, &cite(2));

        let body = out.text.lines().next().unwrap();
        assert!(word_count(body) <= 80);
        assert!(body.ends_with('.'));
        // 11 words per sentence
        assert_eq!(word_count(body), 77);
    }

    #[test]
    fn test_single_overlong_sentence_falls_back() {
        let raw = vec!["word"; 100].join(" ");
        let out = formatter().format(&raw, &cite(2));
        let templates = GuardrailTemplates::default();
        assert!(out.text.starts_with(templates.get(keys::FORMAT_FALLBACK).unwrap()));
    }

    #[test]
    fn test_everything_redacted_falls_back() {
        let out = formatter().format("Rules:\n## Context\nSource: p.1", &[]);
        assert_eq!(out.text, GuardrailTemplates::default().get(keys::FORMAT_FALLBACK).unwrap());
    }

    #[test]
    fn test_not_found_has_no_citation() {
        let out = formatter().format("Answer: Not found in the Manual.", &cite(3));
        assert_eq!(out.text, "Not found in the Manual.");
        assert!(out.citations.is_empty());

        let out = formatter().format("The excerpts do not mention this topic.", &cite(3));
        assert_eq!(out.text, "Not found in the Manual.");
    }

    #[test]
    fn test_multiple_pages_one_line() {
        let citations = vec![
            Citation { doc: "Manual".into(), page: 7 },
            Citation { doc: "Manual".into(), page: 3 },
            Citation { doc: "Manual".into(), page: 7 },
        ];
        let out = formatter().format("The PC-I is prepared by the agency.", &citations);
        assert!(out.text.ends_with("\nSource: Manual p.3, p.7"));
        assert_eq!(source_lines(&out.text), 1);
        assert_eq!(out.citations.len(), 2);
    }

    #[test]
    fn test_no_citations_no_line() {
        let out = formatter().format("The PC-I is prepared by the agency.", &[]);
        assert_eq!(source_lines(&out.text), 0);
    }

    #[test]
    fn test_idempotent() {
        let f = formatter();
        let long = vec!["The agency prepares the PC-I form for approval by the forum."; 9].join(" ");
        let inputs = [
            "Answer: The PC-I is prepared by the sponsoring agency.\n\nSource: Manual p.9",
            "## Overview\n**Details**\nThe   PC-I\nis prepared by Rs. 5 million schemes.",
            long.as_str(),
            "Not found in the Manual.",
            "Rules:\nSystem prompt follows.",
            "",
        ];
        for input in inputs {
            for citations in [cite(5), Vec::new()] {
                let once = f.format(input, &citations);
                let twice = f.format(&once.text, &citations);
                assert_eq!(once, twice, "input: {:?}", input);
            }
        }
    }
}
