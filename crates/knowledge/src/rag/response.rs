//! Structured response returned to the user.

use crate::rag::sources::{map_chunks_to_sources, RagSourceRef};
use crate::rag::types::{Confidence, PipelineOutcome, Resolution};
use serde::{Deserialize, Serialize};

/// Reply when no passage survives retrieval and relevance filtering.
pub const NO_RELEVANT_CONTEXT_ANSWER: &str =
    "I couldn't find relevant information to answer this question in the available documents.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Accepted,
    LowConsistency,
    NoRelevantContext,
}

/// One answer per question, as printed by `veracity ask --json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagResponse {
    pub status: ResponseStatus,
    pub answer: String,

    /// Consistency percentage of the returned answer
    pub consistency_score: Option<f64>,
    pub confidence: Option<Confidence>,
    pub unsupported_claims: Vec<String>,
    pub supported_claims: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,

    /// Whether the answer was regenerated
    pub retried: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub sources: Vec<RagSourceRef>,
}

impl RagResponse {
    pub fn from_outcome(outcome: &PipelineOutcome) -> Self {
        let (status, warning) = match &outcome.resolution {
            Resolution::Accepted(_) => (ResponseStatus::Accepted, None),
            Resolution::Rejected { warning, .. } => {
                (ResponseStatus::LowConsistency, Some(warning.clone()))
            }
            Resolution::NoRelevantContext => (ResponseStatus::NoRelevantContext, None),
        };

        match outcome.checked() {
            Some(checked) => {
                let report = checked.report();
                Self {
                    status,
                    answer: checked.answer().text.clone(),
                    consistency_score: Some(report.score),
                    confidence: Some(Confidence::from_score(report.score)),
                    unsupported_claims: report.unsupported_claims.clone(),
                    supported_claims: report.supported_claims.clone(),
                    verdict: report.verdict.clone(),
                    retried: outcome.retried,
                    warning,
                    sources: map_chunks_to_sources(&checked.answer().context),
                }
            }
            None => Self {
                status,
                answer: NO_RELEVANT_CONTEXT_ANSWER.to_string(),
                consistency_score: None,
                confidence: None,
                unsupported_claims: Vec::new(),
                supported_claims: Vec::new(),
                verdict: None,
                retried: outcome.retried,
                warning,
                sources: Vec::new(),
            },
        }
    }
}
