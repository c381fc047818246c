//! Interactive chat loop.

use super::ask::print_reply;
use clap::Args;
use manualqa_core::{config::AppConfig, AppResult};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const CLEAR: &str = "/clear";
const EXIT: [&str; 2] = ["/exit", "/quit"];

/// Ask questions in a loop, keeping conversation memory
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Knowledge base name
    pub base: String,

    /// Session id (default: a fresh session)
    #[arg(long)]
    pub session: Option<String>,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command for base '{}'", self.base);

        let assistant = manualqa_knowledge::open_assistant(&config.workspace, config, &self.base)?;
        let session = self
            .session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tracing::debug!(session = %session, "Chat session started");

        eprintln!(
            "Ask about the manual in '{}'. {} forgets the conversation, {} leaves.",
            self.base, CLEAR, EXIT[0]
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            eprint!("> ");
            std::io::stderr().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let query = line.trim();

            if query.is_empty() {
                continue;
            }
            if EXIT.contains(&query) {
                break;
            }
            if query == CLEAR {
                assistant.clear_session(&session).await;
                eprintln!("Conversation cleared.");
                continue;
            }

            let reply = assistant.submit(query, &session).await;
            print_reply(&reply);
            println!();
        }

        Ok(())
    }
}
