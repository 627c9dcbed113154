//! Prompt system for Veracity.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - Handlebars template rendering
//! - Built-in pipeline prompts with per-workspace overrides

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use builtin::{
    builtin_prompt, PromptOrigin, PromptSet, FACTCHECK_PROMPT_ID, GENERATE_PROMPT_ID,
    RELEVANCE_PROMPT_ID,
};
pub use loader::{list_prompts, load_prompt, parse_prompt};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptInputSpec, PromptOutputSpec,
};
