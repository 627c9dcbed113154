//! Command handlers for the Veracity CLI.

pub mod ask;
pub mod knowledge;

pub use ask::AskCommand;
pub use knowledge::KnowledgeCommand;
