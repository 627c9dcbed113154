//! Text chunking with configurable size and overlap.

use crate::types::ChunkCandidate;
use text_splitter::{ChunkConfig, TextSplitter};
use veracity_core::{AppError, AppResult};

/// Split text into chunks of at most `chunk_size` characters, consecutive
/// chunks sharing up to `overlap` characters.
///
/// Splits prefer paragraph, sentence and word boundaries over raw character
/// positions. Each candidate records its byte offsets and 1-based line range.
pub fn chunk_text(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<ChunkCandidate>> {
    if text.trim().is_empty() {
        return Ok(vec![]);
    }

    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| {
            AppError::Knowledge(format!(
                "Invalid chunking (size {}, overlap {}): {}",
                chunk_size, overlap, e
            ))
        })?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<ChunkCandidate> = splitter
        .chunk_indices(text)
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .enumerate()
        .map(|(position, (start, chunk))| {
            let end = start + chunk.len();
            let line_start = line_number_at(text, start);
            let line_end = line_start + chunk.matches('\n').count();

            ChunkCandidate {
                source_id: source_id.to_string(),
                position: position as u32,
                text: chunk.to_string(),
                metadata: serde_json::json!({
                    "start": start,
                    "end": end,
                    "lineStart": line_start,
                    "lineEnd": line_end,
                }),
            }
        })
        .collect();

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

/// 1-based line number of the byte at `offset`.
fn line_number_at(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}
