//! Knowledge base configuration and on-disk layout.
//!
//! Each base lives in `.manualqa/knowledge/<base>/`:
//! - `config.yaml`: [`KnowledgeBaseConfig`]
//! - `index.sqlite`: chunks, embeddings and document records

use crate::types::KnowledgeBaseConfig;
use manualqa_core::config::DATA_DIR;
use manualqa_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Load knowledge base configuration.
///
/// Loads from `.manualqa/knowledge/<base>/config.yaml` if it exists,
/// otherwise returns defaults named after the base. The result is validated.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    validate_base_name(base_name)?;
    let config_path = get_config_path(workspace, base_name);

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Knowledge(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Knowledge(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        tracing::debug!("Loaded knowledge base config for '{}'", base_name);
        config
    } else {
        tracing::debug!(
            "Using default knowledge base config for '{}' (no config file found)",
            base_name
        );
        KnowledgeBaseConfig::default()
    };

    config.name = base_name.to_string();
    config.validate()?;
    Ok(config)
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Knowledge(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Knowledge(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

/// Base names become directory names.
fn validate_base_name(base_name: &str) -> AppResult<()> {
    let ok = !base_name.is_empty()
        && base_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(AppError::Knowledge(format!(
            "Invalid knowledge base name '{}': use letters, digits, '-' or '_'",
            base_name
        )))
    }
}

/// Get the path to a base's config file.
pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

/// Get the directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace.join(DATA_DIR).join("knowledge").join(base_name)
}

/// Get the SQLite index path for a base.
pub fn get_index_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("index.sqlite")
}
