//! Query routing.
//!
//! Decides, before any retrieval or generation, whether a query is answered
//! from the Manual or with a fixed guardrail text.

mod classifier;
mod patterns;
mod templates;

pub use classifier::{HintVocabulary, QueryClassifier};
pub use templates::template_response;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Routing category, in rule priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    InScope,
    NumericQuery,
    DefinitionQuery,
    ProcedureQuery,
    ComplianceQuery,
    TimelineQuery,
    FormulaOrMethod,
    MonitoringEvaluation,
    OffScope,
    Bribery,
    Abusive,
    Banter,
    FallbackRequired,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InScope => "in_scope",
            Self::NumericQuery => "numeric_query",
            Self::DefinitionQuery => "definition_query",
            Self::ProcedureQuery => "procedure_query",
            Self::ComplianceQuery => "compliance_query",
            Self::TimelineQuery => "timeline_query",
            Self::FormulaOrMethod => "formula_or_method",
            Self::MonitoringEvaluation => "monitoring_evaluation",
            Self::OffScope => "off_scope",
            Self::Bribery => "bribery",
            Self::Abusive => "abusive",
            Self::Banter => "banter",
            Self::FallbackRequired => "fallback_required",
        }
    }

    /// In-scope family: answered from the Manual.
    pub fn is_in_scope(&self) -> bool {
        matches!(
            self,
            Self::InScope
                | Self::NumericQuery
                | Self::DefinitionQuery
                | Self::ProcedureQuery
                | Self::ComplianceQuery
                | Self::TimelineQuery
                | Self::FormulaOrMethod
                | Self::MonitoringEvaluation
        )
    }

    /// Terse questions that want one or two excerpts.
    pub fn retrieval_mode(&self) -> RetrievalMode {
        match self {
            Self::NumericQuery | Self::DefinitionQuery | Self::TimelineQuery => RetrievalMode::Strict,
            _ => RetrievalMode::Normal,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subcategory {
    Medical,
    Sports,
    Politics,
    GeneralKnowledge,
}

impl Subcategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Sports => "sports",
            Self::Politics => "politics",
            Self::GeneralKnowledge => "general_knowledge",
        }
    }
}

/// Tag that biases chunk scoring towards a kind of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalHint {
    Procedure,
    Formula,
    Monitoring,
    Numeric,
}

/// How many excerpts the answer is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Strict,
    Normal,
}

/// Routing decision for one query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub subcategory: Option<Subcategory>,
    pub confidence: f32,
    pub should_retrieve: bool,
    pub retrieval_hints: BTreeSet<RetrievalHint>,
    pub template_key: Option<String>,
}

impl Classification {
    /// Routed to retrieval by a matched refinement rule or the default.
    pub(crate) fn answerable(category: Category, confidence: f32, hints: BTreeSet<RetrievalHint>) -> Self {
        Self {
            category,
            subcategory: None,
            confidence,
            should_retrieve: true,
            retrieval_hints: hints,
            template_key: None,
        }
    }

    /// Answered with a fixed template.
    pub(crate) fn templated(
        category: Category,
        subcategory: Option<Subcategory>,
        hints: BTreeSet<RetrievalHint>,
    ) -> Self {
        let template_key = match subcategory {
            Some(sub) => format!("{}.{}", category.as_str(), sub.as_str()),
            None => category.as_str().to_string(),
        };
        Self {
            category,
            subcategory,
            confidence: 1.0,
            should_retrieve: false,
            retrieval_hints: hints,
            template_key: Some(template_key),
        }
    }

    pub fn has_hint(&self, hint: RetrievalHint) -> bool {
        self.retrieval_hints.contains(&hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_scope_family() {
        assert!(Category::InScope.is_in_scope());
        assert!(Category::MonitoringEvaluation.is_in_scope());
        assert!(!Category::OffScope.is_in_scope());
        assert!(!Category::Bribery.is_in_scope());
        assert!(!Category::FallbackRequired.is_in_scope());
    }

    #[test]
    fn test_template_key() {
        let c = Classification::templated(Category::OffScope, Some(Subcategory::Sports), BTreeSet::new());
        assert_eq!(c.template_key.as_deref(), Some("off_scope.sports"));
        assert!(!c.should_retrieve);

        let c = Classification::templated(Category::Bribery, None, BTreeSet::new());
        assert_eq!(c.template_key.as_deref(), Some("bribery"));
    }

    #[test]
    fn test_category_serialises_snake_case() {
        let json = serde_json::to_string(&Category::FormulaOrMethod).unwrap();
        assert_eq!(json, "\"formula_or_method\"");
        assert_eq!(Category::NumericQuery.to_string(), "numeric_query");
    }

    #[test]
    fn test_retrieval_mode() {
        assert_eq!(Category::DefinitionQuery.retrieval_mode(), RetrievalMode::Strict);
        assert_eq!(Category::ProcedureQuery.retrieval_mode(), RetrievalMode::Normal);
    }
}
