//! Answer pipeline types.

use crate::rag::error::PipelineError;
use crate::rag::fact_check::answer_digest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use veracity_core::PipelineSettings;

/// A passage returned by the document store for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk identifier within the index
    pub id: String,

    /// Passage text
    pub text: String,

    /// Source document name (e.g., "eu-ai-act.md")
    pub source: String,

    /// Human-readable location within the source (e.g., "lines 12-34")
    pub location: String,

    /// Cosine similarity to the query
    pub similarity: f32,
}

/// A chunk that passed the relevance judge.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,

    /// Judge score, 1-10
    pub relevance: u8,

    /// Judge's short explanation
    pub reason: String,
}

/// One generated answer and the passages it was conditioned on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,

    /// Passages in the order they were shown to the generator
    pub context: Arc<[ScoredChunk]>,

    /// 1 for the first attempt, 2 for the retry
    pub attempt: u8,
}

/// Fact-check result for exactly one answer text.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsistencyReport {
    /// Consistency percentage, 0-100
    pub score: f64,

    /// Claims the checker could not find in the passages
    pub unsupported_claims: Vec<String>,

    /// Claims the checker matched to the passages
    pub supported_claims: Vec<String>,

    /// Free-text assessment, when the checker gave one
    pub verdict: Option<String>,

    /// SHA-256 of the answer text the report was computed against
    pub answer_digest: String,
}

/// An answer paired with the report computed against its exact text.
#[derive(Debug, Clone)]
pub struct CheckedAnswer {
    answer: Answer,
    report: ConsistencyReport,
}

impl CheckedAnswer {
    pub(crate) fn new(answer: Answer, report: ConsistencyReport) -> Result<Self, PipelineError> {
        if report.answer_digest != answer_digest(&answer.text) {
            return Err(PipelineError::Scoring(format!(
                "Report does not belong to answer attempt {}",
                answer.attempt
            )));
        }
        Ok(Self { answer, report })
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn report(&self) -> &ConsistencyReport {
        &self.report
    }

    pub fn score(&self) -> f64 {
        self.report.score
    }

    pub fn into_parts(self) -> (Answer, ConsistencyReport) {
        (self.answer, self.report)
    }
}

/// Confidence band of a consistency score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::High
        } else if score >= 70.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// States visited while answering one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Retrieved,
    Filtered,
    Generated,
    Checked,
    Accepted,
    Retried,
    Rejected,
    NoRelevantContext,
}

/// How a question was resolved.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Score met the acceptance threshold
    Accepted(CheckedAnswer),

    /// Below threshold after the last allowed attempt
    Rejected { best: CheckedAnswer, warning: String },

    /// Nothing retrieved, or nothing passed the relevance cutoff
    NoRelevantContext,
}

/// Final result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub resolution: Resolution,

    /// Whether a second answer was generated
    pub retried: bool,

    /// States in the order they were entered
    pub trace: Vec<PipelineState>,

    /// Chunks returned by the document store
    pub retrieved: usize,
}

impl PipelineOutcome {
    /// The returned answer and its report, if any.
    pub fn checked(&self) -> Option<&CheckedAnswer> {
        match &self.resolution {
            Resolution::Accepted(checked) => Some(checked),
            Resolution::Rejected { best, .. } => Some(best),
            Resolution::NoRelevantContext => None,
        }
    }
}

/// Everything the pipeline needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model used for judging, generation and fact-checking
    pub model: String,
    pub top_k: usize,
    pub relevance_cutoff: u8,
    pub accept_threshold: f64,
    pub allow_retry: bool,

    /// Bound on each external call
    pub stage_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl PipelineConfig {
    pub fn from_settings(settings: &PipelineSettings, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            top_k: settings.top_k as usize,
            relevance_cutoff: settings.relevance_cutoff,
            accept_threshold: settings.accept_threshold,
            allow_retry: settings.allow_retry,
            stage_timeout: Duration::from_secs(settings.stage_timeout_secs),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}
