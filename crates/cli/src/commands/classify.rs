//! Classify command handler.

use super::print_json;
use clap::Args;
use manualqa_core::AppResult;
use manualqa_knowledge::QueryClassifier;

/// Show how a query would be routed, without answering it
#[derive(Args, Debug)]
pub struct ClassifyCommand {
    /// Query text
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ClassifyCommand {
    pub fn execute(&self) -> AppResult<()> {
        let classification = QueryClassifier::new()?.classify(&self.query);

        if self.json {
            return print_json(&classification);
        }

        println!("Category: {}", classification.category);
        if let Some(sub) = classification.subcategory {
            println!("Subcategory: {}", sub.as_str());
        }
        println!("Confidence: {:.2}", classification.confidence);
        println!("Retrieve: {}", classification.should_retrieve);
        if !classification.retrieval_hints.is_empty() {
            let hints: Vec<String> = classification
                .retrieval_hints
                .iter()
                .map(|h| format!("{:?}", h).to_lowercase())
                .collect();
            println!("Hints: {}", hints.join(", "));
        }
        if let Some(key) = &classification.template_key {
            println!("Template: {}", key);
        }

        Ok(())
    }
}
