//! Embedding generation for knowledge bases.
//!
//! Each base records the provider, model and dimensions it was built with;
//! queries must embed with the same settings.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{HashedProvider, OllamaProvider};
