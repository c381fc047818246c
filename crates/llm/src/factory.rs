//! Backend factory.
//!
//! Turns a provider entry from `config.yaml` into a ready client.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use manualqa_core::config::ProviderConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create an inference client for a configured provider entry.
///
/// `timeout` is the transport timeout used when the entry does not set one.
pub fn create_client(config: &ProviderConfig, timeout: Duration) -> Arc<dyn LlmClient> {
    match config {
        ProviderConfig::Ollama {
            endpoint,
            model,
            timeout: entry_timeout,
            ..
        } => {
            let timeout = entry_timeout.map(Duration::from_secs).unwrap_or(timeout);
            tracing::debug!(endpoint = %endpoint, model = %model, ?timeout, "Creating Ollama client");
            Arc::new(
                OllamaClient::with_base_url(endpoint.as_str())
                    .with_model(model.as_str())
                    .with_timeout(timeout),
            )
        }
    }
}
