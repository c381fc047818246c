//! Error types for manualqa.
//!
//! This module defines a unified error enum that covers every internal error
//! category. None of these are shown to end users verbatim: the answering
//! pipeline maps them onto fixed guardrail texts.

use thiserror::Error;

/// Unified error type for manualqa.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inference backend errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base, index and storage errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Source document could not be ingested
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Embedding, vector index or reranker capability failed
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::Retrieval("index offline".to_string());
        assert_eq!(err.to_string(), "Retrieval error: index offline");
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
