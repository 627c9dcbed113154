//! Document store seam between retrieval and the answer pipeline.

use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::index::{self, IndexHit};
use crate::rag::Chunk;
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use veracity_core::{AppError, AppResult};

/// Similarity search over a persisted chunk index.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return at most `k` chunks ordered by descending similarity.
    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<Chunk>>;
}

/// SQLite index queried with the embedder the base was built with.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteStore {
    /// Open the index of an existing knowledge base.
    pub async fn open(workspace: &Path, base_name: &str) -> AppResult<Self> {
        let base_config = crate::config::load_config(workspace, base_name)?;
        let index_path = crate::config::get_index_path(workspace, base_name);
        if !index_path.exists() {
            return Err(AppError::Knowledge(format!(
                "Knowledge base '{}' has no index. Run 'veracity knowledge learn' first.",
                base_name
            )));
        }

        let embedder = create_provider(&EmbeddingConfig::from_base(&base_config)).await?;
        let conn = index::init_index(&index_path)?;

        tracing::debug!(
            "Opened knowledge base '{}' ({}/{})",
            base_name,
            embedder.provider_name(),
            embedder.model_name()
        );

        Ok(Self::new(conn, embedder))
    }

    /// Wrap an already initialized connection.
    pub fn new(conn: Connection, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            conn: Mutex::new(conn),
            embedder,
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    #[tracing::instrument(skip(self, query))]
    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<Chunk>> {
        let embedding = self.embedder.embed(query).await?;

        let hits = {
            let conn = self
                .conn
                .lock()
                .map_err(|_| AppError::Knowledge("Index connection poisoned".to_string()))?;
            index::query_chunks(&conn, &embedding, k)?
        };

        Ok(hits.into_iter().map(chunk_from_hit).collect())
    }
}

fn chunk_from_hit(hit: IndexHit) -> Chunk {
    let source = hit
        .source_path
        .as_deref()
        .and_then(|p| p.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| hit.chunk.source_id.clone());

    Chunk {
        id: hit.chunk.id,
        location: location_label(&hit.chunk.metadata, hit.chunk.position),
        text: hit.chunk.text,
        source,
        similarity: hit.score,
    }
}

/// Human-readable position of a chunk within its source.
fn location_label(metadata: &serde_json::Value, position: u32) -> String {
    let line_start = metadata.get("lineStart").and_then(|v| v.as_u64());
    let line_end = metadata.get("lineEnd").and_then(|v| v.as_u64());

    match (line_start, line_end) {
        (Some(start), Some(end)) if start == end => format!("line {}", start),
        (Some(start), Some(end)) => format!("lines {}-{}", start, end),
        _ => format!("chunk {}", position + 1),
    }
}
