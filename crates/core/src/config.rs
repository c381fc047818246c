//! Configuration management for manualqa.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - The workspace config file (`.manualqa/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win. Per-knowledge-base tuning (segmenter, retrieval,
//! generation, memory) lives next to each base and is owned by the
//! knowledge crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const DATA_DIR: &str = ".manualqa";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .manualqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Provider entry used as the primary inference backend
    pub provider: String,

    /// Model identifier override for the primary backend
    pub model: String,

    /// Provider entry used as the secondary inference backend
    pub fallback_provider: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Inference provider configurations
    pub llm: LlmConfig,
}

/// LLM section of config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(rename = "fallbackProvider", default)]
    pub fallback_provider: Option<String>,

    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "ollama".to_string(),
            ProviderConfig::Ollama {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
                embedding_model: Some("nomic-embed-text".to_string()),
                timeout: Some(8),
            },
        );
        providers.insert(
            "ollama-fallback".to_string(),
            ProviderConfig::Ollama {
                endpoint: "http://localhost:11434".to_string(),
                model: "qwen2.5:3b-instruct".to_string(),
                embedding_model: None,
                timeout: Some(8),
            },
        );

        Self {
            active_provider: "ollama".to_string(),
            fallback_provider: Some("ollama-fallback".to_string()),
            providers,
        }
    }
}

/// Provider-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel", default)]
        embedding_model: Option<String>,
        /// Request timeout in seconds
        #[serde(default)]
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Backend kind, as understood by the llm client factory.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ollama { .. } => "ollama",
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::Ollama { endpoint, .. } => endpoint,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Ollama { model, .. } => model,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let llm = LlmConfig::default();
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: llm.active_provider.clone(),
            model: "llama3.2".to_string(),
            fallback_provider: llm.fallback_provider.clone(),
            log_level: None,
            verbose: false,
            no_color: false,
            llm,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file and the
    /// environment.
    ///
    /// Environment variables:
    /// - `MANUALQA_WORKSPACE`: Override workspace path
    /// - `MANUALQA_CONFIG`: Path to config file
    /// - `MANUALQA_PROVIDER`: Primary provider entry
    /// - `MANUALQA_MODEL`: Primary model identifier
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("MANUALQA_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("MANUALQA_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.data_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("MANUALQA_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("MANUALQA_MODEL") {
            config.model = model;
        }

        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            result.fallback_provider = llm.fallback_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = llm;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            if let Some(provider_config) = self.llm.providers.get(&provider) {
                self.model = provider_config.model().to_string();
            }
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .manualqa directory.
    pub fn data_dir(&self) -> PathBuf {
        self.workspace.join(DATA_DIR)
    }

    /// Ensure the .manualqa directory exists.
    pub fn ensure_data_dir(&self) -> AppResult<()> {
        let data_dir = self.data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", DATA_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Get a provider configuration by entry name.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.providers.get(provider)
    }

    /// Primary backend configuration, with the model override applied.
    pub fn primary_backend(&self) -> AppResult<ProviderConfig> {
        let mut config = self.get_provider_config(&self.provider).cloned().ok_or_else(|| {
            AppError::Config(format!("Unknown provider entry: {}", self.provider))
        })?;

        let ProviderConfig::Ollama { ref mut model, .. } = config;
        *model = self.model.clone();

        Ok(config)
    }

    /// Secondary backend configuration.
    ///
    /// Without a configured fallback entry the primary configuration is reused,
    /// so failover still gets a fresh connection to the same backend.
    pub fn secondary_backend(&self) -> AppResult<ProviderConfig> {
        match self.fallback_provider {
            Some(ref name) => self.get_provider_config(name).cloned().ok_or_else(|| {
                AppError::Config(format!("Unknown fallback provider entry: {}", name))
            }),
            None => self.primary_backend(),
        }
    }

    /// Validate configuration for the configured backends.
    pub fn validate(&self) -> AppResult<()> {
        let primary = self.primary_backend()?;
        let secondary = self.secondary_backend()?;

        for backend in [&primary, &secondary] {
            let ProviderConfig::Ollama {
                endpoint, timeout, ..
            } = backend;

            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "Provider endpoint must be an http(s) URL: {}",
                    endpoint
                )));
            }

            if *timeout == Some(0) {
                return Err(AppError::Config(
                    "Provider timeout must be at least one second".to_string(),
                ));
            }
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model identifier cannot be empty".to_string()));
        }

        Ok(())
    }
}
