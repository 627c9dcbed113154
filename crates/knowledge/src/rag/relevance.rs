//! LLM relevance judge over retrieved chunks.

use crate::rag::error::{PipelineError, Stage};
use crate::rag::json::extract_object;
use crate::rag::stage::{complete, render};
use crate::rag::types::{Chunk, PipelineConfig, ScoredChunk};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use veracity_llm::LlmClient;
use veracity_prompt::PromptDefinition;

/// Characters of a chunk shown to the judge.
const PREVIEW_CHARS: usize = 500;

/// Judge each chunk in turn and keep those scoring at least the cutoff.
///
/// Survivors keep their retrieval order. A reply that cannot be read as a
/// 1-10 score excludes its chunk; a failed or timed-out call aborts, and so
/// does a run in which no reply is readable.
#[instrument(skip_all, fields(chunks = chunks.len(), cutoff = config.relevance_cutoff))]
pub async fn filter_relevant(
    llm: &dyn LlmClient,
    prompt: &PromptDefinition,
    question: &str,
    chunks: Vec<Chunk>,
    config: &PipelineConfig,
) -> Result<Vec<ScoredChunk>, PipelineError> {
    let total = chunks.len();
    let mut relevant = Vec::with_capacity(total);
    let mut unreadable = 0usize;

    for chunk in chunks {
        let excerpt = preview(&chunk.text);
        let built = render(
            Stage::Relevance,
            prompt,
            &[("question", question), ("excerpt", &excerpt)],
        )?;
        let reply = complete(llm, Stage::Relevance, &built, config).await?;

        let Some((relevance, reason)) = parse_judgment(&reply) else {
            warn!(
                "Unreadable relevance judgment for chunk {} ({}), excluding it",
                chunk.id, chunk.source
            );
            unreadable += 1;
            continue;
        };

        debug!(
            "Chunk {} ({} {}) scored {}/10: {}",
            chunk.id, chunk.source, chunk.location, relevance, reason
        );

        if relevance >= config.relevance_cutoff {
            relevant.push(ScoredChunk {
                chunk,
                relevance,
                reason,
            });
        }
    }

    if total > 0 && unreadable == total {
        return Err(PipelineError::Relevance(format!(
            "no readable relevance judgment for {} chunks",
            total
        )));
    }

    info!(
        "{} of {} chunks passed relevance cutoff {}",
        relevant.len(),
        total,
        config.relevance_cutoff
    );

    Ok(relevant)
}

/// First `PREVIEW_CHARS` characters, marked when cut.
fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Score and reason from a judge reply, if the score is an integer in 1-10.
fn parse_judgment(reply: &str) -> Option<(u8, String)> {
    let object = extract_object(reply)?;

    let score = match object.get("relevance_score")? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };

    if !(1..=10).contains(&score) {
        return None;
    }

    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some((score as u8, reason))
}
