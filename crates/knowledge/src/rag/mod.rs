//! Self-correcting RAG answering.
//!
//! Retrieved passages are filtered by an LLM relevance judge, the answer is
//! generated from the survivors only, and a fact-check score decides whether
//! the answer is accepted, regenerated once, or returned with a warning.

pub mod decision;
pub mod error;
pub mod fact_check;
pub mod generator;
mod json;
pub mod pipeline;
pub mod relevance;
pub mod response;
pub mod sources;
mod stage;
pub mod types;

pub use decision::format_percent;
pub use error::{PipelineError, Stage};
pub use pipeline::RagPipeline;
pub use response::{RagResponse, ResponseStatus};
pub use sources::RagSourceRef;
pub use types::{
    Answer, CheckedAnswer, Chunk, Confidence, ConsistencyReport, PipelineConfig,
    PipelineOutcome, PipelineState, Resolution, ScoredChunk,
};
