//! Prompt builder.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use handlebars::Handlebars;
use manualqa_core::{AppError, AppResult};
use serde_json::Value;

/// Build a prompt from a definition and template data.
///
/// Both the system instructions and the user template are rendered against
/// the same `data`. Context and history sizes are read back from the data for
/// the metadata block.
///
/// # Example
/// ```no_run
/// use manualqa_prompt::{build_prompt, default_answer_prompt};
/// use serde_json::json;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = default_answer_prompt()?;
/// let data = json!({ "query": "What is a PC-I?", "context": [], "history": [] });
/// let built = build_prompt(&def, &data)?;
/// println!("{}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, data: &Value) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let system = render_template(&definition.system, data)?;
    let user = render_template(&definition.template, data)?;

    let count = |key: &str| data.get(key).and_then(Value::as_array).map_or(0, Vec::len);

    Ok(BuiltPrompt {
        system: system.trim().to_string(),
        user: user.trim().to_string(),
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            context_chunks: count("context"),
            history_turns: count("history"),
            temperature: definition.behavior.temperature,
            max_tokens: definition.output.max_tokens,
        },
    })
}

/// Render a Handlebars template.
pub(crate) fn render_template(template: &str, data: &Value) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::default_answer_prompt;
    use serde_json::json;

    #[test]
    fn test_render_simple_template() {
        let result = render_template("Question: {{query}}", &json!({ "query": "Fund <release>?" }));
        assert_eq!(result.unwrap(), "Question: Fund <release>?");
    }

    #[test]
    fn test_render_template_missing_variable() {
        // Missing variables render as empty
        let result = render_template("Question: {{missing}}", &json!({}));
        assert_eq!(result.unwrap(), "Question: ");
    }

    #[test]
    fn test_build_answer_prompt() {
        let def = default_answer_prompt().unwrap();
        let data = json!({
            "query": "What is the purpose of PC-I?",
            "context": [
                { "label": "Excerpt 1", "page": 12, "section": "2.1 PC-I", "text": "The PC-I is the basic form." }
            ],
            "history": [
                { "query": "What is PC-II?", "answer": "A feasibility study form." }
            ]
        });

        let built = build_prompt(&def, &data).unwrap();
        assert!(built.user.contains("[Excerpt 1] (page 12, 2.1 PC-I)"));
        assert!(built.user.contains("Q: What is PC-II?"));
        assert!(built.user.ends_with("Question: What is the purpose of PC-I?"));
        assert_eq!(built.metadata.context_chunks, 1);
        assert_eq!(built.metadata.history_turns, 1);
        assert!(built.system.starts_with("You answer questions"));
    }

    #[test]
    fn test_system_independent_of_data() {
        let def = default_answer_prompt().unwrap();
        let a = build_prompt(&def, &json!({ "query": "a", "context": [], "history": [] })).unwrap();
        let b = build_prompt(&def, &json!({ "query": "b", "context": [], "history": [] })).unwrap();
        assert_eq!(a.system, b.system);
        assert!(!a.user.contains("Earlier conversation"));
    }
}
