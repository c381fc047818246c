//! Typed backend failures.

use manualqa_core::AppError;
use std::time::Duration;
use thiserror::Error;

/// Why a single backend call did not produce usable text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendFault {
    /// The call did not complete within its deadline.
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    /// Transport failure or non-success HTTP status.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered, but the body was empty or unparseable.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendFault {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Unavailable(_) => "unavailable",
            Self::Malformed(_) => "malformed",
        }
    }
}

impl From<BackendFault> for AppError {
    fn from(fault: BackendFault) -> Self {
        AppError::Llm(fault.to_string())
    }
}
