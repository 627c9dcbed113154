//! Answer generation constrained to the filtered passages.

use crate::rag::error::{PipelineError, Stage};
use crate::rag::stage::{complete, render};
use crate::rag::types::{Answer, PipelineConfig, ScoredChunk};
use std::sync::Arc;
use tracing::{info, instrument};
use veracity_llm::LlmClient;
use veracity_prompt::PromptDefinition;

/// Render passages as numbered `[Source N]` blocks.
pub fn build_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, scored)| format!("[Source {}]\n{}", i + 1, scored.chunk.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Generate one answer from `context`.
#[instrument(skip_all, fields(attempt = attempt, sources = context.len()))]
pub async fn generate_answer(
    llm: &dyn LlmClient,
    prompt: &PromptDefinition,
    question: &str,
    context: &Arc<[ScoredChunk]>,
    attempt: u8,
    config: &PipelineConfig,
) -> Result<Answer, PipelineError> {
    let rendered_context = build_context(context);
    let built = render(
        Stage::Generation,
        prompt,
        &[("question", question), ("context", &rendered_context)],
    )?;

    let text = complete(llm, Stage::Generation, &built, config).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(PipelineError::Generation(
            "Model returned an empty answer".to_string(),
        ));
    }

    info!("Generated answer attempt {} ({} chars)", attempt, text.len());

    Ok(Answer {
        text: text.to_string(),
        context: Arc::clone(context),
        attempt,
    })
}
