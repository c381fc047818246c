//! Ask command handler.

use super::print_json;
use clap::Args;
use manualqa_core::{config::AppConfig, AppResult};
use manualqa_knowledge::AssistantReply;

/// Ask one question about an ingested manual
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Knowledge base name
    pub base: String,

    /// Question text
    pub query: String,

    /// Session id for conversation memory (default: a fresh session)
    #[arg(long)]
    pub session: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command for base '{}'", self.base);

        let assistant = manualqa_knowledge::open_assistant(&config.workspace, config, &self.base)?;
        let session = self
            .session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let reply = assistant.submit(&self.query, &session).await;

        tracing::debug!(
            category = %reply.category,
            used_rag = reply.used_rag,
            citations = reply.citations.len(),
            "Reply ready"
        );

        if self.json {
            print_json(&reply)
        } else {
            print_reply(&reply);
            Ok(())
        }
    }
}

/// Answer text as the user should see it. The citation line is already
/// part of the answer.
pub(crate) fn print_reply(reply: &AssistantReply) {
    println!("{}", reply.answer);
}
