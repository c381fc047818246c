//! Ollama inference backend.
//!
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::fault::BackendFault;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2";
const DEFAULT_TIMEOUT_SECS: u64 = 8;

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama client bound to one model.
pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Client for the default local endpoint and model.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Transport timeout applied to every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: false,
        }
    }

    fn convert_response(&self, response: OllamaResponse) -> Result<LlmResponse, BackendFault> {
        if response.response.trim().is_empty() {
            return Err(BackendFault::Malformed("empty completion".to_string()));
        }

        Ok(LlmResponse {
            content: response.response,
            model: response.model,
            usage: LlmUsage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ),
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> BackendFault {
        if err.is_timeout() {
            BackendFault::Timeout(self.timeout)
        } else {
            BackendFault::Unavailable(format!("Failed to reach Ollama at {}: {}", self.base_url, err))
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, BackendFault> {
        tracing::debug!(model = %self.model, endpoint = %self.base_url, "Sending completion request to Ollama");

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&self.to_ollama_request(request))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendFault::Unavailable(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;
        let ollama_response: OllamaResponse = serde_json::from_str(&body)
            .map_err(|e| BackendFault::Malformed(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::debug!(
            model = %ollama_response.model,
            eval_count = ollama_response.eval_count.unwrap_or(0),
            "Received completion from Ollama"
        );

        self.convert_response(ollama_response)
    }
}
