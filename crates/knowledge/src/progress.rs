//! Ingestion progress reporting.
//!
//! Long ingests (hundreds of pages, remote embeddings) report each phase
//! through an optional callback so a front end can show where they are.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPhase {
    Read,
    Segment,
    Embed,
    Index,
}

impl IngestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Segment => "segment",
            Self::Embed => "embed",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress update.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: IngestPhase,
    pub current: u64,
    pub total: Option<u64>,
    pub message: String,
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    pub fn percentage(&self) -> Option<f64> {
        self.total
            .map(|t| if t > 0 { self.current as f64 / t as f64 * 100.0 } else { 100.0 })
    }

    /// `[embed] 32/120 (27%) - model=nomic-embed-text`
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        let pct = self
            .percentage()
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();
        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            started: Instant::now(),
        }
    }

    /// Reporter that only logs.
    pub fn noop() -> Self {
        Self {
            callback: None,
            started: Instant::now(),
        }
    }

    pub fn emit(&self, phase: IngestPhase, current: u64, total: Option<u64>, message: impl Into<String>) {
        let event = ProgressEvent {
            phase,
            current,
            total,
            message: message.into(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        };

        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            "Ingest progress"
        );

        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}
