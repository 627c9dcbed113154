//! Knowledge base management and self-correcting question answering.
//!
//! Documents are parsed, chunked, embedded and stored in a local SQLite
//! index. Questions run through the [`rag::RagPipeline`], which judges the
//! retrieved passages, generates an answer and fact-checks it.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod parser;
pub mod rag;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use rag::{PipelineConfig, PipelineError, PipelineOutcome, RagPipeline, RagResponse};
pub use store::{DocumentStore, SqliteStore};
pub use types::{
    BaseStats, KnowledgeBaseConfig, KnowledgeChunk, KnowledgeSource, LearnOptions, LearnStats,
    SearchOptions,
};

use chrono::Utc;
use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use veracity_core::{AppError, AppResult};
use veracity_llm::LlmClient;
use veracity_prompt::PromptSet;
use walkdir::WalkDir;

/// Result of indexing one file.
enum FileOutcome {
    Indexed { chunks: u32, bytes: u64 },
    Unchanged,
}

/// Learn from local documents and populate the knowledge base.
///
/// Files whose extracted text is already indexed are skipped. A file that
/// fails to parse or embed is logged and counted, and the run continues.
pub async fn learn(workspace: &Path, options: LearnOptions) -> AppResult<LearnStats> {
    let start = Instant::now();

    tracing::info!("Starting learn operation for base '{}'", options.base_name);

    let mut base_config = config::load_config(workspace, &options.base_name)?;
    let index_path = config::get_index_path(workspace, &options.base_name);
    let mut conn = index::init_index(&index_path)?;

    if options.reset {
        tracing::info!("Resetting knowledge base '{}'", options.base_name);
        index::reset_index(&conn)?;
    }

    if options.provider.is_some() || options.model.is_some() {
        let provider = options
            .provider
            .clone()
            .unwrap_or_else(|| base_config.provider.clone());
        let mut requested = EmbeddingConfig::for_provider(&provider, options.model.as_deref())?;
        requested.endpoint = base_config.endpoint.clone();

        let (existing_sources, _) = index::get_stats(&conn)?;
        if existing_sources > 0 {
            EmbeddingConfig::from_base(&base_config)
                .validate_consistency(&requested)
                .map_err(|e| {
                    AppError::Knowledge(format!(
                        "{}. Re-run with --reset to rebuild '{}' with the new embeddings",
                        e, options.base_name
                    ))
                })?;
        }

        requested.apply_to(&mut base_config);
    }

    let embedder = create_provider(&EmbeddingConfig::from_base(&base_config)).await?;

    let mut stats = LearnStats::default();

    for path in collect_files(&options, &mut stats) {
        match process_file(&mut conn, embedder.as_ref(), &base_config, &path).await {
            Ok(FileOutcome::Indexed { chunks, bytes }) => {
                stats.sources_count += 1;
                stats.chunks_count += chunks;
                stats.bytes_processed += bytes;
            }
            Ok(FileOutcome::Unchanged) => {
                tracing::debug!("Unchanged, skipping: {:?}", path);
                stats.unchanged_count += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to learn {:?}: {}", path, e);
                stats.failed_count += 1;
            }
        }
    }

    config::save_config(workspace, &base_config)?;

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Learn operation completed: {} sources, {} chunks, {} unchanged, {} failed in {:.2}s",
        stats.sources_count,
        stats.chunks_count,
        stats.unchanged_count,
        stats.failed_count,
        stats.duration_secs
    );

    Ok(stats)
}

/// Supported files under the requested paths, in a stable order.
fn collect_files(options: &LearnOptions, stats: &mut LearnStats) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in &options.paths {
        if path.is_file() {
            if parser::ContentType::from_path(path).is_supported() {
                files.push(path.clone());
            } else {
                tracing::warn!("Unsupported file type, skipping: {:?}", path);
                stats.failed_count += 1;
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file()
                    && parser::ContentType::from_path(entry_path).is_supported()
                    && should_include(entry_path, options)
                {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            tracing::warn!("Path does not exist: {:?}", path);
            stats.failed_count += 1;
        }
    }

    files
}

/// Check if a file should be included based on patterns.
fn should_include(path: &Path, options: &LearnOptions) -> bool {
    let path_str = path.to_string_lossy();

    if options
        .exclude
        .iter()
        .any(|pattern| path_str.contains(pattern.as_str()))
    {
        return false;
    }

    options.include.is_empty()
        || options
            .include
            .iter()
            .any(|pattern| path_str.contains(pattern.as_str()))
}

async fn process_file(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    base_config: &KnowledgeBaseConfig,
    path: &Path,
) -> AppResult<FileOutcome> {
    tracing::debug!("Processing file: {:?}", path);

    let stored_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let text = parser::parse_file(path)?;
    if text.is_empty() {
        return Err(AppError::Knowledge("No text could be extracted".to_string()));
    }

    let content_hash = sha256_hex(text.as_bytes());
    if index::find_source_hash(conn, &stored_path)?.as_deref() == Some(content_hash.as_str()) {
        return Ok(FileOutcome::Unchanged);
    }

    let source_id = uuid::Uuid::new_v4().to_string();
    let candidates = chunker::chunk_text(
        &source_id,
        &text,
        base_config.chunk_size as usize,
        base_config.chunk_overlap as usize,
    )?;

    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != candidates.len() {
        return Err(AppError::Knowledge(format!(
            "Embedder returned {} vectors for {} chunks",
            embeddings.len(),
            candidates.len()
        )));
    }

    let chunks: Vec<KnowledgeChunk> = candidates
        .into_iter()
        .zip(embeddings)
        .map(|(candidate, embedding)| KnowledgeChunk {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: candidate.source_id,
            position: candidate.position,
            text: candidate.text,
            embedding: Some(embedding),
            metadata: candidate.metadata,
        })
        .collect();

    let source = KnowledgeSource {
        id: source_id,
        path: stored_path,
        content_type: parser::ContentType::from_path(path).as_str().to_string(),
        content_hash,
        learned_at: Utc::now(),
        size_bytes: text.len() as u64,
    };

    index::replace_source(conn, &source, &chunks)?;

    tracing::debug!(
        "Processed {:?}: {} chunks, {} bytes",
        path,
        chunks.len(),
        source.size_bytes
    );

    Ok(FileOutcome::Indexed {
        chunks: chunks.len() as u32,
        bytes: source.size_bytes,
    })
}

/// Raw similarity search, without relevance judging.
pub async fn search(workspace: &Path, options: SearchOptions) -> AppResult<Vec<rag::Chunk>> {
    tracing::info!(
        "Searching knowledge base '{}' for: {}",
        options.base_name,
        options.query
    );

    let store = SqliteStore::open(workspace, &options.base_name).await?;
    store.search(&options.query, options.top_k as usize).await
}

/// Answer a question from a knowledge base with the self-correcting pipeline.
///
/// Prompts are the built-in ones unless overridden under `.veracity/prompts/`.
pub async fn ask(
    workspace: &Path,
    base_name: &str,
    question: &str,
    llm: Arc<dyn LlmClient>,
    pipeline_config: PipelineConfig,
) -> AppResult<PipelineOutcome> {
    let store = SqliteStore::open(workspace, base_name).await?;
    let prompts = PromptSet::load(workspace)?;
    let pipeline = RagPipeline::new(Arc::new(store), llm, prompts, pipeline_config);

    Ok(pipeline.run(question).await?)
}

/// Clean (reset) a knowledge base.
pub fn clean(workspace: &Path, base_name: &str) -> AppResult<()> {
    tracing::info!("Cleaning knowledge base '{}'", base_name);

    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let conn = index::init_index(&index_path)?;
    index::reset_index(&conn)?;

    tracing::info!("Knowledge base '{}' cleaned", base_name);
    Ok(())
}

/// Get statistics for a knowledge base.
pub fn stats(workspace: &Path, base_name: &str) -> AppResult<BaseStats> {
    tracing::info!("Getting stats for knowledge base '{}'", base_name);

    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let base_config = config::load_config(workspace, base_name)?;
    let conn = index::init_index(&index_path)?;
    let (sources_count, chunks_count) = index::get_stats(&conn)?;
    let last_learn_at = index::last_learned_at(&conn)?;

    let db_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    Ok(BaseStats {
        base_name: base_name.to_string(),
        sources_count,
        chunks_count,
        db_size_bytes,
        embedding: format!("{}/{}", base_config.provider, base_config.model),
        last_learn_at,
    })
}

/// SHA-256 of `data`, hex encoded.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
