//! Built-in prompts for the answer pipeline and workspace overrides.

use crate::loader::{list_prompts, load_prompt, parse_prompt, prompt_path};
use crate::types::PromptDefinition;
use std::path::Path;
use veracity_core::{AppError, AppResult};

/// Relevance judge: scores one excerpt against the question.
pub const RELEVANCE_PROMPT_ID: &str = "rag.relevance";

/// Grounded answer generation over `[Source N]` blocks.
pub const GENERATE_PROMPT_ID: &str = "rag.generate";

/// Fact-check of an answer against the same sources.
pub const FACTCHECK_PROMPT_ID: &str = "rag.factcheck";

const BUILTIN_SOURCES: [(&str, &str); 3] = [
    (
        RELEVANCE_PROMPT_ID,
        include_str!("../prompts/rag.relevance.yml"),
    ),
    (GENERATE_PROMPT_ID, include_str!("../prompts/rag.generate.yml")),
    (
        FACTCHECK_PROMPT_ID,
        include_str!("../prompts/rag.factcheck.yml"),
    ),
];

/// Where a prompt in a [`PromptSet`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOrigin {
    Builtin,
    Workspace,
}

/// The three pipeline prompts, resolved once per run.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub relevance: PromptDefinition,
    pub generate: PromptDefinition,
    pub factcheck: PromptDefinition,
    origins: Vec<(String, PromptOrigin)>,
}

impl PromptSet {
    /// The prompts compiled into the binary.
    pub fn builtin() -> AppResult<Self> {
        Self::resolve(|id| builtin_prompt(id).map(|def| (def, PromptOrigin::Builtin)))
    }

    /// Builtins, replaced by `.veracity/prompts/<id>.yml` wherever such a
    /// file exists. A present but invalid override is an error.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        for id in list_prompts(workspace_path)? {
            if !BUILTIN_SOURCES.iter().any(|(known, _)| *known == id) {
                tracing::warn!("Ignoring prompt override '{}': not a pipeline prompt", id);
            }
        }

        Self::resolve(|id| {
            if prompt_path(workspace_path, id).exists() {
                let def = load_prompt(workspace_path, id)?;
                Ok((def, PromptOrigin::Workspace))
            } else {
                builtin_prompt(id).map(|def| (def, PromptOrigin::Builtin))
            }
        })
    }

    fn resolve<F>(mut fetch: F) -> AppResult<Self>
    where
        F: FnMut(&str) -> AppResult<(PromptDefinition, PromptOrigin)>,
    {
        let mut origins = Vec::with_capacity(BUILTIN_SOURCES.len());
        let mut take = |id: &str| -> AppResult<PromptDefinition> {
            let (def, origin) = fetch(id)?;
            tracing::debug!(prompt = id, ?origin, "Resolved prompt");
            origins.push((id.to_string(), origin));
            Ok(def)
        };

        let relevance = take(RELEVANCE_PROMPT_ID)?;
        let generate = take(GENERATE_PROMPT_ID)?;
        let factcheck = take(FACTCHECK_PROMPT_ID)?;

        Ok(Self {
            relevance,
            generate,
            factcheck,
            origins,
        })
    }

    /// Origin of the prompt with `id`, if it belongs to this set.
    pub fn origin(&self, id: &str) -> Option<&PromptOrigin> {
        self.origins
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, origin)| origin)
    }
}

/// Parse the compiled-in definition for `id`.
pub fn builtin_prompt(id: &str) -> AppResult<PromptDefinition> {
    let (_, source) = BUILTIN_SOURCES
        .iter()
        .find(|(known, _)| *known == id)
        .ok_or_else(|| AppError::Prompt(format!("No built-in prompt named '{}'", id)))?;
    parse_prompt(source)
}
