//! Rule-based query classifier.

use super::patterns;
use super::{Category, Classification, RetrievalHint, Subcategory};
use manualqa_core::{AppError, AppResult};
use regex::{Regex, RegexSet};
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Banter only matches queries up to this many words.
const BANTER_MAX_WORDS: usize = 6;

#[derive(Debug, Clone, Copy)]
enum RuleKind {
    Bribery,
    Abusive,
    Banter,
    OffScope(Subcategory),
    Refine(Category),
}

#[derive(Debug)]
struct Rule {
    kind: RuleKind,
    patterns: RegexSet,
}

/// Keyword vocabularies behind retrieval hints.
///
/// Shared by the classifier (query side) and retrieval (chunk side).
#[derive(Debug)]
pub struct HintVocabulary {
    procedure: Regex,
    formula: Regex,
    monitoring: Regex,
    numeric: Regex,
}

impl HintVocabulary {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            procedure: compile(patterns::HINT_PROCEDURE)?,
            formula: compile(patterns::HINT_FORMULA)?,
            monitoring: compile(patterns::HINT_MONITORING)?,
            numeric: compile(patterns::HINT_NUMERIC)?,
        })
    }

    /// Whether `text` uses the vocabulary of `hint`. Case-insensitive.
    pub fn matches(&self, hint: RetrievalHint, text: &str) -> bool {
        let text = text.to_lowercase();
        self.regex(hint).is_match(&text)
    }

    fn regex(&self, hint: RetrievalHint) -> &Regex {
        match hint {
            RetrievalHint::Procedure => &self.procedure,
            RetrievalHint::Formula => &self.formula,
            RetrievalHint::Monitoring => &self.monitoring,
            RetrievalHint::Numeric => &self.numeric,
        }
    }

    fn hints_for(&self, normalized: &str) -> BTreeSet<RetrievalHint> {
        [
            RetrievalHint::Procedure,
            RetrievalHint::Formula,
            RetrievalHint::Monitoring,
            RetrievalHint::Numeric,
        ]
        .into_iter()
        .filter(|hint| self.regex(*hint).is_match(normalized))
        .collect()
    }
}

/// Deterministic, stateless query router.
///
/// Rules are compiled once in [`QueryClassifier::new`] and evaluated in a
/// fixed order; the first match wins.
#[derive(Debug)]
pub struct QueryClassifier {
    rules: Vec<Rule>,
    whitelist: RegexSet,
    banter_max_words: usize,
    hints: Arc<HintVocabulary>,
}

impl QueryClassifier {
    pub fn new() -> AppResult<Self> {
        let banter = format!(
            "^(?:{}){}$",
            patterns::BANTER_PHRASES.join("|"),
            patterns::BANTER_SUFFIX
        );

        let rules = vec![
            rule(RuleKind::Bribery, patterns::BRIBERY)?,
            rule(RuleKind::Abusive, patterns::ABUSIVE)?,
            rule(RuleKind::Banter, &[banter.as_str()])?,
            rule(RuleKind::OffScope(Subcategory::Medical), patterns::OFF_SCOPE_MEDICAL)?,
            rule(RuleKind::OffScope(Subcategory::Sports), patterns::OFF_SCOPE_SPORTS)?,
            rule(RuleKind::OffScope(Subcategory::Politics), patterns::OFF_SCOPE_POLITICS)?,
            rule(RuleKind::OffScope(Subcategory::GeneralKnowledge), patterns::OFF_SCOPE_GENERAL)?,
            rule(RuleKind::Refine(Category::NumericQuery), patterns::NUMERIC_QUERY)?,
            rule(RuleKind::Refine(Category::DefinitionQuery), patterns::DEFINITION_QUERY)?,
            rule(RuleKind::Refine(Category::ProcedureQuery), patterns::PROCEDURE_QUERY)?,
            rule(RuleKind::Refine(Category::ComplianceQuery), patterns::COMPLIANCE_QUERY)?,
            rule(RuleKind::Refine(Category::TimelineQuery), patterns::TIMELINE_QUERY)?,
            rule(RuleKind::Refine(Category::FormulaOrMethod), patterns::FORMULA_QUERY)?,
            rule(RuleKind::Refine(Category::MonitoringEvaluation), patterns::MONITORING_QUERY)?,
        ];

        Ok(Self {
            rules,
            whitelist: compile_set(patterns::WHITELIST)?,
            banter_max_words: BANTER_MAX_WORDS,
            hints: Arc::new(HintVocabulary::new()?),
        })
    }

    pub fn with_banter_max_words(mut self, words: usize) -> Self {
        self.banter_max_words = words;
        self
    }

    /// Hint vocabulary, for scoring chunks against the same keywords.
    pub fn hints(&self) -> Arc<HintVocabulary> {
        Arc::clone(&self.hints)
    }

    /// Classify a raw query. Never fails: an internal fault routes the
    /// query to retrieval.
    pub fn classify(&self, text: &str) -> Classification {
        let normalized = normalize(text);
        if !normalized.chars().any(char::is_alphanumeric) {
            return Classification::templated(Category::FallbackRequired, None, BTreeSet::new());
        }

        match catch_unwind(AssertUnwindSafe(|| self.evaluate(&normalized))) {
            Ok(classification) => {
                tracing::debug!(
                    category = classification.category.as_str(),
                    confidence = classification.confidence,
                    "Classified query"
                );
                classification
            }
            Err(_) => {
                tracing::warn!("Classifier fault, routing query to retrieval");
                Classification::answerable(Category::InScope, 0.0, BTreeSet::new())
            }
        }
    }

    fn evaluate(&self, normalized: &str) -> Classification {
        let hints = self.hints.hints_for(normalized);
        let whitelisted = self.whitelist.is_match(normalized);
        let words = normalized.split_whitespace().count();

        for rule in &self.rules {
            match rule.kind {
                RuleKind::Bribery | RuleKind::OffScope(_) if whitelisted => continue,
                RuleKind::Banter if words > self.banter_max_words => continue,
                _ => {}
            }

            if !rule.patterns.is_match(normalized) {
                continue;
            }

            return match rule.kind {
                RuleKind::Bribery => Classification::templated(Category::Bribery, None, hints),
                RuleKind::Abusive => Classification::templated(Category::Abusive, None, hints),
                RuleKind::Banter => Classification::templated(Category::Banter, None, hints),
                RuleKind::OffScope(sub) => Classification::templated(Category::OffScope, Some(sub), hints),
                RuleKind::Refine(category) => Classification::answerable(category, 1.0, hints),
            };
        }

        let confidence = if whitelisted { 1.0 } else { 0.0 };
        Classification::answerable(Category::InScope, confidence, hints)
    }
}

/// Lower-case, keep `& - % .` as the only punctuation, collapse whitespace,
/// drop trailing periods.
pub(crate) fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || matches!(c, '&' | '-' | '%' | '.') {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .trim_end()
        .to_string()
}

fn rule(kind: RuleKind, patterns: &[&str]) -> AppResult<Rule> {
    Ok(Rule {
        kind,
        patterns: compile_set(patterns)?,
    })
}

fn compile(pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern).map_err(|e| AppError::Other(format!("Invalid routing pattern {}: {}", pattern, e)))
}

fn compile_set(patterns: &[&str]) -> AppResult<RegexSet> {
    RegexSet::new(patterns).map_err(|e| AppError::Other(format!("Invalid routing pattern set: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> QueryClassifier {
        QueryClassifier::new().unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  What's the  PC-I?? "), "what s the pc-i");
        assert_eq!(normalize("Rs. 60 million..."), "rs. 60 million");
        assert_eq!(normalize("M&E / reporting"), "m&e reporting");
    }

    #[test]
    fn test_sports_refused() {
        let c = classifier().classify("who won the 1992 cricket world cup?");
        assert_eq!(c.category, Category::OffScope);
        assert_eq!(c.subcategory, Some(Subcategory::Sports));
        assert!(!c.should_retrieve);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.template_key.as_deref(), Some("off_scope.sports"));
    }

    #[test]
    fn test_bribery_refused() {
        let c = classifier().classify("can i give bribe to speed up approval?");
        assert_eq!(c.category, Category::Bribery);
        assert!(!c.should_retrieve);
        assert_eq!(c.template_key.as_deref(), Some("bribery"));
    }

    #[test]
    fn test_bribery_beats_off_scope() {
        let c = classifier().classify("can I bribe the cricket selectors for the world cup team");
        assert_eq!(c.category, Category::Bribery);
    }

    #[test]
    fn test_whitelist_overrides_misuse() {
        let c = classifier().classify("project fund utilization report");
        assert_eq!(c.category, Category::InScope);
        assert!(c.should_retrieve);

        let c = classifier().classify("how is misuse of funds dealt with in the audit");
        assert!(c.category.is_in_scope());
        assert!(c.should_retrieve);
    }

    #[test]
    fn test_whitelist_does_not_override_abusive() {
        let c = classifier().classify("your audit answers are stupid");
        assert_eq!(c.category, Category::Abusive);
    }

    #[test]
    fn test_banter_only_for_short_queries() {
        let c = classifier().classify("Hello there!");
        assert_eq!(c.category, Category::Banter);

        let c = classifier().classify("thanks");
        assert_eq!(c.category, Category::Banter);

        let c = classifier().classify("hello, what documents are attached to the PC-I form?");
        assert!(c.category.is_in_scope());

        let strict = classifier().with_banter_max_words(1);
        assert!(strict.classify("Hello there!").category.is_in_scope());
    }

    #[test]
    fn test_default_in_scope() {
        let c = classifier().classify("What is the purpose of PC-I?");
        assert_eq!(c.category, Category::InScope);
        assert_eq!(c.confidence, 0.0);
        assert!(c.should_retrieve);
        assert!(c.template_key.is_none());
    }

    #[test]
    fn test_refinements() {
        let c = classifier();
        assert_eq!(c.classify("How much escalation is allowed?").category, Category::NumericQuery);
        assert_eq!(c.classify("Define PC-II").category, Category::DefinitionQuery);
        assert_eq!(c.classify("How to prepare a PC-I?").category, Category::ProcedureQuery);
        assert_eq!(c.classify("Is a feasibility study mandatory?").category, Category::ComplianceQuery);
        assert_eq!(c.classify("When is the PC-IV submitted?").category, Category::TimelineQuery);
        assert_eq!(c.classify("Which formula gives the IRR?").category, Category::FormulaOrMethod);
        assert_eq!(c.classify("Who monitors the projects?").category, Category::MonitoringEvaluation);
    }

    #[test]
    fn test_hints() {
        let c = classifier().classify("how to calculate the cost of monitoring");
        assert!(c.has_hint(RetrievalHint::Formula));
        assert!(c.has_hint(RetrievalHint::Monitoring));
        assert!(c.has_hint(RetrievalHint::Numeric));
        assert!(!c.has_hint(RetrievalHint::Procedure));
    }

    #[test]
    fn test_empty_query_needs_fallback() {
        for query in ["", "   ", "???", "!!"] {
            let c = classifier().classify(query);
            assert_eq!(c.category, Category::FallbackRequired);
            assert!(!c.should_retrieve);
        }
    }

    #[test]
    fn test_deterministic() {
        let c = classifier();
        let query = "How much is the PC-I approval limit?";
        let first = c.classify(query);
        for _ in 0..10 {
            assert_eq!(c.classify(query), first);
        }
    }

    #[test]
    fn test_hint_vocabulary_on_chunk_text() {
        let vocab = HintVocabulary::new().unwrap();
        assert!(vocab.matches(RetrievalHint::Procedure, "The PC-I is SUBMITTED to the Planning Commission."));
        assert!(vocab.matches(RetrievalHint::Monitoring, "Quarterly progress is reviewed."));
        assert!(!vocab.matches(RetrievalHint::Formula, "The agency prepares the form."));
    }
}
