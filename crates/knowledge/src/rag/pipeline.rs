//! Self-correcting answer loop.
//!
//! Retrieve, judge relevance, generate, fact-check, then accept, retry once
//! with the same passages, or reject with the better of the two attempts.

use crate::rag::decision::{better_of, format_percent, meets_threshold, rejection_warning};
use crate::rag::error::{PipelineError, Stage};
use crate::rag::fact_check::check_answer;
use crate::rag::generator::generate_answer;
use crate::rag::relevance::filter_relevant;
use crate::rag::stage::with_timeout;
use crate::rag::types::{
    CheckedAnswer, PipelineConfig, PipelineOutcome, PipelineState, Resolution, ScoredChunk,
};
use crate::store::DocumentStore;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use veracity_llm::LlmClient;
use veracity_prompt::PromptSet;

/// The answer pipeline and its collaborators.
pub struct RagPipeline {
    store: Arc<dyn DocumentStore>,
    llm: Arc<dyn LlmClient>,
    prompts: PromptSet,
    config: PipelineConfig,
}

impl RagPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        llm: Arc<dyn LlmClient>,
        prompts: PromptSet,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            llm,
            prompts,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer one question.
    ///
    /// Stage failures are returned as errors. A low score after the last
    /// allowed attempt is a `Rejected` outcome, not an error.
    #[instrument(skip(self), fields(provider = self.llm.provider_name(), model = %self.config.model))]
    pub async fn run(&self, question: &str) -> Result<PipelineOutcome, PipelineError> {
        let mut trace = Vec::new();

        let retrieved = with_timeout(
            Stage::Retrieval,
            self.config.stage_timeout,
            self.store.search(question, self.config.top_k),
        )
        .await?;
        trace.push(PipelineState::Retrieved);
        let retrieved_count = retrieved.len();
        info!("Retrieved {} chunks (top-{})", retrieved_count, self.config.top_k);

        if retrieved.is_empty() {
            info!("Document store returned no chunks");
            return Ok(no_relevant_context(trace, retrieved_count));
        }

        let relevant = filter_relevant(
            self.llm.as_ref(),
            &self.prompts.relevance,
            question,
            retrieved,
            &self.config,
        )
        .await?;
        trace.push(PipelineState::Filtered);

        if relevant.is_empty() {
            info!(
                "No chunk reached relevance {}/10, skipping generation",
                self.config.relevance_cutoff
            );
            return Ok(no_relevant_context(trace, retrieved_count));
        }

        let context: Arc<[ScoredChunk]> = relevant.into();
        let threshold = self.config.accept_threshold;

        let first = self.attempt(question, &context, 1, &mut trace).await?;
        if meets_threshold(&first, threshold) {
            return Ok(accepted(first, false, trace, retrieved_count));
        }

        if !self.config.allow_retry {
            return Ok(rejected(first, threshold, false, trace, retrieved_count));
        }

        info!(
            "Consistency {} below {}, regenerating once",
            format_percent(first.score()),
            format_percent(threshold)
        );
        trace.push(PipelineState::Retried);

        let second = self.attempt(question, &context, 2, &mut trace).await?;
        if meets_threshold(&second, threshold) {
            return Ok(accepted(second, true, trace, retrieved_count));
        }

        let best = better_of(first, second);
        Ok(rejected(best, threshold, true, trace, retrieved_count))
    }

    async fn attempt(
        &self,
        question: &str,
        context: &Arc<[ScoredChunk]>,
        attempt: u8,
        trace: &mut Vec<PipelineState>,
    ) -> Result<CheckedAnswer, PipelineError> {
        let answer = generate_answer(
            self.llm.as_ref(),
            &self.prompts.generate,
            question,
            context,
            attempt,
            &self.config,
        )
        .await?;
        trace.push(PipelineState::Generated);

        let checked = check_answer(
            self.llm.as_ref(),
            &self.prompts.factcheck,
            question,
            answer,
            &self.config,
        )
        .await?;
        trace.push(PipelineState::Checked);

        Ok(checked)
    }
}

fn no_relevant_context(mut trace: Vec<PipelineState>, retrieved: usize) -> PipelineOutcome {
    trace.push(PipelineState::NoRelevantContext);
    PipelineOutcome {
        resolution: Resolution::NoRelevantContext,
        retried: false,
        trace,
        retrieved,
    }
}

fn accepted(
    checked: CheckedAnswer,
    retried: bool,
    mut trace: Vec<PipelineState>,
    retrieved: usize,
) -> PipelineOutcome {
    info!("Accepted answer at {} consistency", format_percent(checked.score()));
    trace.push(PipelineState::Accepted);
    PipelineOutcome {
        resolution: Resolution::Accepted(checked),
        retried,
        trace,
        retrieved,
    }
}

fn rejected(
    best: CheckedAnswer,
    threshold: f64,
    retried: bool,
    mut trace: Vec<PipelineState>,
    retrieved: usize,
) -> PipelineOutcome {
    let warning = rejection_warning(best.score(), threshold);
    warn!(
        "Returning attempt {} at {} consistency with warning",
        best.answer().attempt,
        format_percent(best.score())
    );
    trace.push(PipelineState::Rejected);
    PipelineOutcome {
        resolution: Resolution::Rejected { best, warning },
        retried,
        trace,
        retrieved,
    }
}
