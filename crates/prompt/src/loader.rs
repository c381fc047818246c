//! Loader for YAML prompt definitions in `.manualqa/prompts/`.

use crate::answer::{default_answer_prompt, ANSWER_PROMPT_ID};
use crate::types::PromptDefinition;
use manualqa_core::config::DATA_DIR;
use manualqa_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(DATA_DIR).join("prompts")
}

/// Load a prompt definition by ID from the workspace.
///
/// Looks for `.manualqa/prompts/<id>.yml`.
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load a workspace prompt, falling back to the built-in definition when the
/// workspace has no override for it.
///
/// A present but invalid override is an error rather than a silent fallback.
pub fn load_prompt_or_default(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));
    if prompt_file.exists() {
        return load_prompt(workspace_path, prompt_id);
    }

    match prompt_id {
        ANSWER_PROMPT_ID => default_answer_prompt(),
        other => Err(AppError::Prompt(format!("No built-in prompt named {}", other))),
    }
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.system.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt system instructions cannot be empty".to_string(),
        ));
    }

    if !def.template.contains("{{query}}") {
        return Err(AppError::Prompt(format!(
            "Prompt {} template must reference {{{{query}}}}",
            def.id
        )));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if !(0.0..=2.0).contains(&def.behavior.temperature) {
        return Err(AppError::Prompt(format!(
            "Prompt temperature out of range: {}",
            def.behavior.temperature
        )));
    }

    Ok(())
}
