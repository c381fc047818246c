use super::Classification;
use manualqa_prompt::GuardrailTemplates;

/// Fixed response for a classification that skips retrieval.
///
/// Looks up `(category, subcategory)` first, then the category alone.
/// Returns `None` for queries routed to retrieval.
pub fn template_response<'a>(templates: &'a GuardrailTemplates, classification: &Classification) -> Option<&'a str> {
    if classification.should_retrieve {
        return None;
    }

    let category = classification.category.as_str();
    let text = match classification.template_key.as_deref() {
        Some(key) => templates.lookup(&[key, category]),
        None => templates.lookup(&[category]),
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{Category, QueryClassifier, Subcategory};
    use std::collections::BTreeSet;

    #[test]
    fn test_subcategory_text() {
        let templates = GuardrailTemplates::default();
        let c = QueryClassifier::new().unwrap().classify("who won the 1992 cricket world cup?");
        let text = template_response(&templates, &c).unwrap();
        assert!(text.contains("Sports questions are outside its scope."));
    }

    #[test]
    fn test_bribery_text_is_long_refusal() {
        let templates = GuardrailTemplates::default();
        let c = Classification::templated(Category::Bribery, None, BTreeSet::new());
        let words = template_response(&templates, &c).unwrap().split_whitespace().count();
        assert!((70..=85).contains(&words), "{}", words);
    }

    #[test]
    fn test_falls_back_to_category_key() {
        let templates = GuardrailTemplates::default();
        let mut c = Classification::templated(Category::OffScope, Some(Subcategory::Medical), BTreeSet::new());
        c.template_key = Some("off_scope.unknown".to_string());
        assert_eq!(
            template_response(&templates, &c),
            templates.get("off_scope")
        );
    }

    #[test]
    fn test_retrieval_has_no_template() {
        let templates = GuardrailTemplates::default();
        let c = QueryClassifier::new().unwrap().classify("What is the purpose of PC-I?");
        assert!(template_response(&templates, &c).is_none());
    }

    #[test]
    fn test_same_text_every_time() {
        let templates = GuardrailTemplates::default();
        let classifier = QueryClassifier::new().unwrap();
        let a = classifier.classify("hello");
        let b = classifier.classify("hello");
        assert_eq!(template_response(&templates, &a), template_response(&templates, &b));
    }
}
