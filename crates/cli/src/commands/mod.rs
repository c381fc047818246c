//! Command handlers for the manualqa CLI.

pub mod ask;
pub mod chat;
pub mod classify;
pub mod ingest;
pub mod knowledge;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use classify::ClassifyCommand;
pub use ingest::IngestCommand;
pub use knowledge::{CleanCommand, StatsCommand};

use manualqa_core::AppResult;
use serde::Serialize;

/// Pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
