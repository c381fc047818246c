//! Prompt and fixed-response text for manualqa.
//!
//! This crate owns every piece of text the assistant can emit that is not
//! produced by a model:
//! - the answer prompt (YAML definition rendered with Handlebars)
//! - the guardrail table of fixed refusals and service messages

pub mod answer;
pub mod builder;
pub mod guardrails;
pub mod loader;
pub mod types;

pub use answer::{default_answer_prompt, ANSWER_PROMPT_ID};
pub use builder::build_prompt;
pub use guardrails::GuardrailTemplates;
pub use loader::{load_prompt, load_prompt_or_default};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec};
