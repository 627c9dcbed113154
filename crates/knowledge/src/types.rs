//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    pub name: String,

    /// Embedding provider ("ollama" or "hashed")
    pub provider: String,

    /// Embedding model
    pub model: String,

    /// Embedding endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap between consecutive chunks, in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: u32,
}

fn default_chunk_size() -> u32 {
    1000
}

fn default_chunk_overlap() -> u32 {
    200
}

fn default_embedding_dim() -> u32 {
    384
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: "ollama".to_string(),
            model: "all-minilm".to_string(),
            endpoint: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

/// A source document recorded in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    /// Unique source identifier
    pub id: String,

    /// File the text was extracted from
    pub path: PathBuf,

    /// Content type ("markdown", "pdf", "text")
    pub content_type: String,

    /// SHA-256 of the extracted text, used to skip unchanged files
    pub content_hash: String,

    /// When this source was indexed
    pub learned_at: DateTime<Utc>,

    /// Extracted text size in bytes
    pub size_bytes: u64,
}

/// A text chunk with embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Unique chunk identifier
    pub id: String,

    /// Source document ID
    pub source_id: String,

    /// Position within source
    pub position: u32,

    /// Text content
    pub text: String,

    /// Embedding vector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Offsets and line range within the source
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Options for the learn operation.
#[derive(Debug, Clone, Default)]
pub struct LearnOptions {
    /// Knowledge base name
    pub base_name: String,

    /// Local files or directories to learn from
    pub paths: Vec<PathBuf>,

    /// Keep only paths containing one of these substrings
    pub include: Vec<String>,

    /// Drop paths containing any of these substrings
    pub exclude: Vec<String>,

    /// Reset the base before learning
    pub reset: bool,

    /// Embedding provider override ("ollama" or "hashed")
    pub provider: Option<String>,

    /// Embedding model override
    pub model: Option<String>,
}

/// Statistics from a learn operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnStats {
    /// Number of sources indexed
    pub sources_count: u32,

    /// Number of chunks created
    pub chunks_count: u32,

    /// Files skipped because their content was already indexed
    pub unchanged_count: u32,

    /// Files that could not be read or embedded
    pub failed_count: u32,

    /// Total bytes processed
    pub bytes_processed: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Options for a raw similarity search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Knowledge base name
    pub base_name: String,

    /// Query text
    pub query: String,

    /// Number of chunks to retrieve
    pub top_k: u32,
}

/// Statistics for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStats {
    /// Base name
    pub base_name: String,

    /// Number of sources
    pub sources_count: u32,

    /// Number of chunks
    pub chunks_count: u32,

    /// Database size in bytes
    pub db_size_bytes: u64,

    /// Embedding provider and model the base was built with
    pub embedding: String,

    /// Last learn timestamp
    pub last_learn_at: Option<DateTime<Utc>>,
}

/// Internal chunk candidate before embedding.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
    pub source_id: String,
    pub position: u32,
    pub text: String,
    pub metadata: serde_json::Value,
}
