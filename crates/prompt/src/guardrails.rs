//! Guardrail template table.
//!
//! Fixed, non-generated responses keyed by routing outcome or failure mode.
//! The table is built once at start-up from the built-in texts, optionally
//! overridden per key by `.manualqa/guardrails.yaml`, and never mutated
//! afterwards. Share it behind an `Arc`.

use manualqa_core::config::DATA_DIR;
use manualqa_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;

/// Well-known template keys.
pub mod keys {
    pub const BRIBERY: &str = "bribery";
    pub const ABUSIVE: &str = "abusive";
    pub const BANTER: &str = "banter";
    pub const OFF_SCOPE: &str = "off_scope";
    pub const OFF_SCOPE_MEDICAL: &str = "off_scope.medical";
    pub const OFF_SCOPE_SPORTS: &str = "off_scope.sports";
    pub const OFF_SCOPE_POLITICS: &str = "off_scope.politics";
    pub const OFF_SCOPE_GENERAL: &str = "off_scope.general_knowledge";
    pub const FALLBACK: &str = "fallback_required";
    pub const NOT_FOUND: &str = "not_found";
    pub const RETRIEVAL_UNAVAILABLE: &str = "retrieval_unavailable";
    pub const SERVICE_UNAVAILABLE: &str = "service_unavailable";
    pub const TIMEOUT: &str = "timeout";
    pub const FORMAT_FALLBACK: &str = "format_fallback";
}

const DEFAULTS: &[(&str, &str)] = &[
    (
        keys::BRIBERY,
        "Offering or accepting a bribe, or any payment to speed up an approval, is a serious \
         offence and is strictly prohibited. Approvals under the Manual follow a fixed procedure \
         based on merit, complete documentation and the prescribed review stages, and no \
         individual can bypass them. If you have been asked for an illegitimate payment, report \
         it to the relevant anti-corruption authority. I can help you understand the correct \
         approval procedure and required documents described in the Manual instead.",
    ),
    (
        keys::ABUSIVE,
        "Please keep the conversation respectful. I can help with questions about the Manual.",
    ),
    (
        keys::BANTER,
        "Hello! I answer questions about the Manual. Ask me about procedures, approvals, \
         formats or timelines.",
    ),
    (
        keys::OFF_SCOPE,
        "I can only answer questions about the Manual. That topic is outside its scope.",
    ),
    (
        keys::OFF_SCOPE_MEDICAL,
        "I can only answer questions about the Manual and cannot give medical advice. \
         Please consult a qualified health professional.",
    ),
    (
        keys::OFF_SCOPE_SPORTS,
        "I can only answer questions about the Manual. Sports questions are outside its scope.",
    ),
    (
        keys::OFF_SCOPE_POLITICS,
        "I can only answer questions about the Manual and do not comment on politics.",
    ),
    (
        keys::OFF_SCOPE_GENERAL,
        "I can only answer questions about the Manual. General knowledge questions are outside \
         its scope.",
    ),
    (
        keys::FALLBACK,
        "I could not understand the question. Please rephrase it with a few more words about \
         what you need from the Manual.",
    ),
    (keys::NOT_FOUND, "Not found in the Manual."),
    (
        keys::RETRIEVAL_UNAVAILABLE,
        "The Manual search service is temporarily unavailable. Please try again shortly.",
    ),
    (
        keys::SERVICE_UNAVAILABLE,
        "The answering service is temporarily unavailable. Please try again shortly.",
    ),
    (
        keys::TIMEOUT,
        "The request took too long to answer. Please try again.",
    ),
    (
        keys::FORMAT_FALLBACK,
        "I could not produce a well-formed answer from the Manual. Please rephrase the question.",
    ),
];

/// Immutable key to text table.
#[derive(Debug, Clone)]
pub struct GuardrailTemplates {
    templates: HashMap<String, String>,
}

impl Default for GuardrailTemplates {
    fn default() -> Self {
        Self {
            templates: DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl GuardrailTemplates {
    /// Built-in texts merged with `.manualqa/guardrails.yaml` if present.
    ///
    /// The override file is a flat `key: text` mapping. Unknown keys are kept,
    /// so new subcategories can be given their own text without a rebuild.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let path = workspace_path.join(DATA_DIR).join("guardrails.yaml");
        let mut table = Self::default();

        if !path.exists() {
            return Ok(table);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Prompt(format!("Failed to read guardrails file {:?}: {}", path, e))
        })?;
        let overrides: HashMap<String, String> = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Prompt(format!("Failed to parse guardrails file {:?}: {}", path, e))
        })?;

        for (key, text) in overrides {
            let text = text.trim();
            if text.is_empty() {
                return Err(AppError::Prompt(format!(
                    "Guardrail text for '{}' cannot be empty",
                    key
                )));
            }
            table.templates.insert(key, text.to_string());
        }

        tracing::info!(path = ?path, "Loaded guardrail overrides");
        Ok(table)
    }

    /// Text for `key`, if the table has it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }

    /// First present key wins; the generic fallback text otherwise.
    pub fn lookup(&self, candidates: &[&str]) -> &str {
        candidates
            .iter()
            .find_map(|key| self.get(key))
            .or_else(|| self.get(keys::FALLBACK))
            .unwrap_or("Please rephrase your question about the Manual.")
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
