//! SQLite-backed vector index for knowledge chunks.

use crate::types::{KnowledgeChunk, KnowledgeSource};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use veracity_core::{AppError, AppResult};

/// A chunk returned by a similarity query.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub chunk: KnowledgeChunk,

    /// File the chunk was cut from, when the source row still exists
    pub source_path: Option<PathBuf>,

    /// Cosine similarity to the query embedding
    pub score: f32,
}

/// Initialize the SQLite index database.
pub fn init_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            content_type TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            learned_at TEXT NOT NULL,
            size_bytes INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT,
            FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);
        "#,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

/// Insert a source into the index.
pub fn insert_source(conn: &Connection, source: &KnowledgeSource) -> AppResult<()> {
    conn.execute(
        "INSERT INTO sources (id, path, content_type, content_hash, learned_at, size_bytes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            source.id,
            source.path.to_string_lossy(),
            source.content_type,
            source.content_hash,
            source.learned_at.to_rfc3339(),
            source.size_bytes as i64,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert source: {}", e)))?;

    Ok(())
}

/// Insert a chunk with embedding into the index.
pub fn insert_chunk(conn: &Connection, chunk: &KnowledgeChunk) -> AppResult<()> {
    let embedding_bytes = embedding_to_bytes(
        chunk
            .embedding
            .as_ref()
            .ok_or_else(|| AppError::Knowledge("Chunk missing embedding".to_string()))?,
    );

    let metadata_json = serde_json::to_string(&chunk.metadata)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize metadata: {}", e)))?;

    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, source_id, position, text, embedding, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chunk.id,
            chunk.source_id,
            chunk.position as i64,
            chunk.text,
            embedding_bytes,
            metadata_json,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

/// Replace everything indexed for `source.path` with `source` and `chunks`,
/// atomically.
pub fn replace_source(
    conn: &mut Connection,
    source: &KnowledgeSource,
    chunks: &[KnowledgeChunk],
) -> AppResult<()> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

    tx.execute(
        "DELETE FROM sources WHERE path = ?1",
        params![source.path.to_string_lossy()],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to remove previous source: {}", e)))?;

    insert_source(&tx, source)?;
    for chunk in chunks {
        insert_chunk(&tx, chunk)?;
    }

    tx.commit()
        .map_err(|e| AppError::Knowledge(format!("Failed to commit source: {}", e)))?;

    Ok(())
}

/// Content hash recorded for a path, if it has been indexed.
pub fn find_source_hash(conn: &Connection, path: &Path) -> AppResult<Option<String>> {
    conn.query_row(
        "SELECT content_hash FROM sources WHERE path = ?1",
        params![path.to_string_lossy()],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| AppError::Knowledge(format!("Failed to look up source: {}", e)))
}

/// Query the index for top-k most similar chunks.
pub fn query_chunks(
    conn: &Connection,
    query_embedding: &[f32],
    top_k: usize,
) -> AppResult<Vec<IndexHit>> {
    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.source_id, c.position, c.text, c.embedding, c.metadata, s.path
             FROM chunks c LEFT JOIN sources s ON s.id = c.source_id",
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            let metadata_json: Option<String> = row.get(5)?;
            let source_path: Option<String> = row.get(6)?;

            Ok((
                KnowledgeChunk {
                    id: row.get(0)?,
                    source_id: row.get(1)?,
                    position: row.get::<_, i64>(2)? as u32,
                    text: row.get(3)?,
                    embedding: None,
                    metadata: metadata_json
                        .and_then(|json| serde_json::from_str(&json).ok())
                        .unwrap_or(serde_json::Value::Null),
                },
                embedding_bytes,
                source_path.map(PathBuf::from),
            ))
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        let (chunk, embedding_bytes, source_path) =
            row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk row: {}", e)))?;
        let embedding = bytes_to_embedding(&embedding_bytes)?;
        let score = cosine_similarity(query_embedding, &embedding);
        results.push(IndexHit {
            chunk,
            source_path,
            score,
        });
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);

    tracing::debug!(
        "Retrieved {} chunks (requested top-{})",
        results.len(),
        top_k
    );

    Ok(results)
}

/// Get statistics for the index.
///
/// Returns (sources_count, chunks_count).
pub fn get_stats(conn: &Connection) -> AppResult<(u32, u32)> {
    let sources_count: u32 = conn
        .query_row("SELECT COUNT(*) FROM sources", [], |row| {
            row.get::<_, i64>(0).map(|v| v as u32)
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to count sources: {}", e)))?;

    let chunks_count: u32 = conn
        .query_row("SELECT COUNT(*) FROM chunks", [], |row| {
            row.get::<_, i64>(0).map(|v| v as u32)
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))?;

    Ok((sources_count, chunks_count))
}

/// Most recent time any source was learned.
pub fn last_learned_at(conn: &Connection) -> AppResult<Option<DateTime<Utc>>> {
    let latest: Option<String> = conn
        .query_row("SELECT MAX(learned_at) FROM sources", [], |row| row.get(0))
        .map_err(|e| AppError::Knowledge(format!("Failed to read learn time: {}", e)))?;

    Ok(latest
        .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
        .map(|ts| ts.with_timezone(&Utc)))
}

/// Reset the index (delete all data).
pub fn reset_index(conn: &Connection) -> AppResult<()> {
    conn.execute("DELETE FROM chunks", [])
        .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;

    conn.execute("DELETE FROM sources", [])
        .map_err(|e| AppError::Knowledge(format!("Failed to delete sources: {}", e)))?;

    tracing::info!("Reset knowledge base index");
    Ok(())
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn source(id: &str, path: &str, hash: &str) -> KnowledgeSource {
        KnowledgeSource {
            id: id.to_string(),
            path: PathBuf::from(path),
            content_type: "text".to_string(),
            content_hash: hash.to_string(),
            learned_at: Utc::now(),
            size_bytes: 100,
        }
    }

    fn chunk(id: &str, source_id: &str, embedding: Vec<f32>) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.to_string(),
            source_id: source_id.to_string(),
            position: 0,
            text: format!("text of {}", id),
            embedding: Some(embedding),
            metadata: serde_json::json!({"lineStart": 1, "lineEnd": 3}),
        }
    }

    #[test]
    fn test_init_index() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = init_index(temp_file.path()).unwrap();

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(table_count >= 2);
    }

    #[test]
    fn test_insert_and_query() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = init_index(temp_file.path()).unwrap();

        insert_source(&conn, &source("source1", "docs/act.md", "h1")).unwrap();
        insert_chunk(&conn, &chunk("chunk1", "source1", vec![1.0, 0.0, 0.0])).unwrap();

        let results = query_chunks(&conn, &[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "chunk1");
        assert_eq!(results[0].source_path, Some(PathBuf::from("docs/act.md")));
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].chunk.metadata["lineEnd"], 3);
    }

    #[test]
    fn test_replace_source_drops_old_chunks() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut conn = init_index(temp_file.path()).unwrap();

        replace_source(
            &mut conn,
            &source("v1", "docs/act.md", "h1"),
            &[chunk("a", "v1", vec![1.0, 0.0]), chunk("b", "v1", vec![0.0, 1.0])],
        )
        .unwrap();
        replace_source(
            &mut conn,
            &source("v2", "docs/act.md", "h2"),
            &[chunk("c", "v2", vec![1.0, 1.0])],
        )
        .unwrap();

        assert_eq!(get_stats(&conn).unwrap(), (1, 1));
        assert_eq!(
            find_source_hash(&conn, Path::new("docs/act.md")).unwrap(),
            Some("h2".to_string())
        );
        assert_eq!(find_source_hash(&conn, Path::new("other.md")).unwrap(), None);
    }

    #[test]
    fn test_reset_and_last_learned() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = init_index(temp_file.path()).unwrap();

        assert!(last_learned_at(&conn).unwrap().is_none());
        insert_source(&conn, &source("s", "a.txt", "h")).unwrap();
        assert!(last_learned_at(&conn).unwrap().is_some());

        reset_index(&conn).unwrap();
        assert_eq!(get_stats(&conn).unwrap(), (0, 0));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_embedding_bytes_roundtrip() {
        let original = vec![0.25, -1.5, 3.0];
        let restored = bytes_to_embedding(&embedding_to_bytes(&original)).unwrap();
        assert_eq!(original, restored);
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
    }
}
