//! Embedding configuration types and management.

use crate::types::KnowledgeBaseConfig;
use serde::{Deserialize, Serialize};
use veracity_core::{AppError, AppResult};

/// Embedding settings of a knowledge base.
///
/// Stored flat inside the base's `config.yaml`; a base must be queried with
/// the same provider, model and dimensions it was built with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "ollama" or "hashed"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Endpoint override for HTTP providers
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from_base(&KnowledgeBaseConfig::default())
    }
}

impl EmbeddingConfig {
    /// Extract the embedding settings from a base config.
    pub fn from_base(base: &KnowledgeBaseConfig) -> Self {
        Self {
            provider: base.provider.clone(),
            model: base.model.clone(),
            dimensions: base.embedding_dim as usize,
            endpoint: base.endpoint.clone(),
        }
    }

    /// Write these settings back into a base config.
    pub fn apply_to(&self, base: &mut KnowledgeBaseConfig) {
        base.provider = self.provider.clone();
        base.model = self.model.clone();
        base.embedding_dim = self.dimensions as u32;
        base.endpoint = self.endpoint.clone();
    }

    /// Settings for `provider`, with the model given or that provider's default.
    pub fn for_provider(provider: &str, model: Option<&str>) -> AppResult<Self> {
        let (default_model, dimensions) = match provider {
            "ollama" => ("all-minilm", 384),
            "hashed" | "trigram" => ("trigram-v1", 384),
            _ => {
                return Err(AppError::Knowledge(format!(
                    "Unknown embedding provider: '{}'. Supported providers: ollama, hashed",
                    provider
                )))
            }
        };

        let model = model.unwrap_or(default_model);
        let dimensions = known_dimensions(model).unwrap_or(dimensions);

        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
            dimensions,
            endpoint: None,
        })
    }

    /// Validate that another config is consistent with this one.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.provider != other.provider {
            return Err(AppError::Knowledge(format!(
                "Provider mismatch: expected '{}', got '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Knowledge(format!(
                "Model mismatch: expected '{}', got '{}'",
                self.model, other.model
            )));
        }

        if self.dimensions != other.dimensions {
            return Err(AppError::Knowledge(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimensions, other.dimensions
            )));
        }

        Ok(())
    }
}

/// Output width of common Ollama embedding models.
fn known_dimensions(model: &str) -> Option<usize> {
    match model.split(':').next().unwrap_or(model) {
        "all-minilm" => Some(384),
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        _ => None,
    }
}
