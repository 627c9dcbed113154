//! User-facing source references for an answer.

use crate::rag::types::ScoredChunk;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum snippet length for source references.
const MAX_SNIPPET_LENGTH: usize = 150;

/// A passage the answer was generated from.
///
/// Chunk IDs and similarity scores stay internal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSourceRef {
    /// Source document name (e.g., "eu-ai-act.md")
    pub source: String,

    /// Location within the source (e.g., "lines 12-34")
    pub location: String,

    /// Relevance judge score, 1-10
    pub relevance: u8,

    /// Start of the passage, truncated at a word boundary
    pub snippet: String,
}

/// Map passages to source references, dropping repeated (source, location) pairs.
pub fn map_chunks_to_sources(chunks: &[ScoredChunk]) -> Vec<RagSourceRef> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for scored in chunks {
        let key = (scored.chunk.source.as_str(), scored.chunk.location.as_str());
        if !seen.insert(key) {
            continue;
        }

        sources.push(RagSourceRef {
            source: scored.chunk.source.clone(),
            location: scored.chunk.location.clone(),
            relevance: scored.relevance,
            snippet: truncate_snippet(&scored.chunk.text, MAX_SNIPPET_LENGTH),
        });
    }

    sources
}

/// Collapse whitespace and cut to at most `max_chars`, preferring a word boundary.
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let Some((cut, _)) = flat.char_indices().nth(max_chars) else {
        return flat;
    };

    let truncated = &flat[..cut];
    match truncated.rfind(' ') {
        Some(space) if space > 0 => format!("{}...", &truncated[..space]),
        _ => format!("{}...", truncated),
    }
}
