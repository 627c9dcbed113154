//! LLM integration crate for Veracity.
//!
//! This crate provides a provider-agnostic abstraction for interacting with
//! Large Language Models (LLMs). Every stage of the answer pipeline goes
//! through the same [`LlmClient`] trait.
//!
//! # Providers
//! - **Groq**: hosted OpenAI-compatible API (default)
//! - **OpenAI**: any `/chat/completions` endpoint
//! - **Ollama**: local LLM runtime
//!
//! # Example
//! ```no_run
//! use veracity_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiCompatibleClient};
pub use types::ProviderType;
