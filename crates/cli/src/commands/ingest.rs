//! Ingest command handler.

use super::print_json;
use clap::Args;
use manualqa_core::{config::AppConfig, AppResult};
use manualqa_knowledge::{IngestOptions, ProgressEvent, ProgressReporter};
use std::path::PathBuf;
use std::sync::Arc;

/// Ingest a manual into a knowledge base
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Knowledge base name
    pub base: String,

    /// Text file with form-feed page breaks, or a directory of page files
    pub path: PathBuf,

    /// Document name used in citations (default: file stem)
    #[arg(long)]
    pub doc_name: Option<String>,

    /// Drop everything in the base before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for base '{}'", self.base);

        let options = IngestOptions {
            base_name: self.base.clone(),
            path: self.path.clone(),
            doc_name: self.doc_name.clone(),
            reset: self.reset,
        };

        // Progress goes to stderr so stdout stays clean for --json
        let progress = ProgressReporter::new(Arc::new(|event: ProgressEvent| {
            eprintln!("{}", event.format_simple());
        }));

        let report = manualqa_knowledge::ingest(&config.workspace, options, &progress).await?;

        if self.json {
            return print_json(&report);
        }

        if report.already_indexed {
            println!(
                "'{}' is already indexed in '{}' ({} chunks), nothing to do",
                report.document, report.base_name, report.chunks_count
            );
            return Ok(());
        }

        println!(
            "Ingested '{}' into '{}': {} pages, {} chunks in {:.2}s",
            report.document, report.base_name, report.pages, report.chunks_count, report.duration_secs
        );

        if !report.skipped.is_empty() {
            println!("Skipped {} spans:", report.skipped.len());
            for span in &report.skipped {
                println!("- p.{} [{}] {}", span.page, span.reason.as_str(), span.excerpt);
            }
        }

        Ok(())
    }
}
