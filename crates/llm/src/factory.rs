//! LLM provider factory.
//!
//! Builds a client from the resolved provider name, endpoint and secret.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiCompatibleClient};
use crate::types::ProviderType;
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "groq")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key, required by hosted providers
/// * `timeout` - Per-request HTTP timeout
///
/// # Errors
/// Returns error if the provider is unknown, a required key is missing, or
/// the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;
    let base_url = endpoint.unwrap_or(provider_type.default_endpoint());

    match provider_type {
        ProviderType::Ollama => {
            let client = OllamaClient::with_base_url(base_url)
                .with_timeout(timeout)
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI | ProviderType::Groq => {
            let key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                format!("{} provider requires API key", provider_type.as_str())
            })?;
            let client =
                OpenAiCompatibleClient::new(provider_type.as_str(), base_url, key, timeout)
                    .map_err(|e| e.to_string())?;
            Ok(Arc::new(client))
        }
    }
}
