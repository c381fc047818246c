//! Knowledge base maintenance: stats and clean.

use super::print_json;
use clap::Args;
use manualqa_core::{config::AppConfig, AppResult};

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Knowledge base name
    pub base: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command for base '{}'", self.base);

        let stats = manualqa_knowledge::stats(&config.workspace, &self.base).await?;

        if self.json {
            return print_json(&stats);
        }

        println!("Knowledge base: {}", stats.base_name);
        println!("  Documents: {}", stats.documents.len());
        for doc in &stats.documents {
            println!(
                "    - {} ({} pages, {} chunks, ingested {})",
                doc.name,
                doc.pages,
                doc.chunks_count,
                doc.ingested_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        println!("  Chunks: {}", stats.chunks_count);
        println!("  DB size: {} bytes", stats.db_size_bytes);
        if let Some(last) = stats.last_ingest_at {
            println!("  Last ingest: {}", last);
        }

        Ok(())
    }
}

/// Remove every document and chunk from a knowledge base
#[derive(Args, Debug)]
pub struct CleanCommand {
    /// Knowledge base name
    pub base: String,
}

impl CleanCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing clean command for base '{}'", self.base);

        manualqa_knowledge::clean(&config.workspace, &self.base).await?;

        println!("Knowledge base '{}' cleaned", self.base);
        Ok(())
    }
}
