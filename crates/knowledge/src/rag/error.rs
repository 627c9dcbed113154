//! Stage-level pipeline errors.

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use veracity_core::AppError;

/// Pipeline stage that talks to an external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieval,
    Relevance,
    Generation,
    Scoring,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retrieval => "retrieval",
            Self::Relevance => "relevance",
            Self::Generation => "generation",
            Self::Scoring => "fact-check",
        };
        f.write_str(name)
    }
}

/// Failure of one pipeline stage.
///
/// A low consistency score is not an error; these are the cases where a
/// stage could not produce its result at all.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document store unavailable: {0}")]
    Retrieval(String),

    #[error("Relevance judge failed: {0}")]
    Relevance(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Fact-check failed: {0}")]
    Scoring(String),

    #[error("{stage} stage timed out after {limit:?}")]
    Timeout { stage: Stage, limit: Duration },
}

impl PipelineError {
    pub(crate) fn at(stage: Stage, message: impl Into<String>) -> Self {
        let message = message.into();
        match stage {
            Stage::Retrieval => Self::Retrieval(message),
            Stage::Relevance => Self::Relevance(message),
            Stage::Generation => Self::Generation(message),
            Stage::Scoring => Self::Scoring(message),
        }
    }

    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Retrieval(_) => Stage::Retrieval,
            Self::Relevance(_) => Stage::Relevance,
            Self::Generation(_) => Stage::Generation,
            Self::Scoring(_) => Stage::Scoring,
            Self::Timeout { stage, .. } => *stage,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err.stage() {
            Stage::Retrieval => AppError::Knowledge(err.to_string()),
            _ => AppError::Llm(err.to_string()),
        }
    }
}
