//! Inference backend integration for manualqa.
//!
//! Generation goes through the [`LlmClient`] trait so the orchestrator can
//! hold a primary and a secondary backend without caring which runtime
//! serves them. Failures are reported as a typed [`BackendFault`] so the
//! caller can tell a timeout apart from an unreachable or misbehaving
//! backend.
//!
//! # Example
//! ```no_run
//! use manualqa_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What is a PC-I?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod fault;
pub mod providers;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use fault::BackendFault;
pub use providers::OllamaClient;
