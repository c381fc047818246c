//! Prompt types.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Behavioral settings
    pub behavior: PromptBehavior,

    /// System instructions (Handlebars syntax). Sent unchanged to every backend.
    pub system: String,

    /// User message template (Handlebars syntax)
    pub template: String,

    /// Output specification
    pub output: PromptOutputSpec,
}

/// Behavioral settings for prompt execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBehavior {
    /// Tone (e.g., "formal", "neutral")
    pub tone: String,

    /// Style (e.g., "concise")
    pub style: String,

    /// Sampling temperature passed to the backend
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.1
}

/// Output specification for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format (e.g., "text")
    pub format: String,

    /// Token cap passed to the backend
    #[serde(rename = "maxTokens", default)]
    pub max_tokens: Option<u32>,
}

/// A fully built prompt ready for a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message
    pub system: String,

    /// User message
    pub user: String,

    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Number of context chunks rendered into the prompt
    #[serde(rename = "contextChunks")]
    pub context_chunks: usize,

    /// Number of history turns rendered into the prompt
    #[serde(rename = "historyTurns")]
    pub history_turns: usize,

    pub temperature: f32,

    #[serde(rename = "maxTokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}
