//! Bounded calls to the external services.

use crate::rag::error::{PipelineError, Stage};
use crate::rag::types::PipelineConfig;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use veracity_core::AppResult;
use veracity_llm::{LlmClient, LlmRequest};
use veracity_prompt::{build_prompt, BuiltPrompt, PromptDefinition};

/// Await `fut` for at most `limit`, converting failures into `stage` errors.
pub(crate) async fn with_timeout<T, F>(
    stage: Stage,
    limit: Duration,
    fut: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PipelineError::at(stage, e.to_string())),
        Err(_) => {
            tracing::warn!("{} stage exceeded {:?}", stage, limit);
            Err(PipelineError::Timeout { stage, limit })
        }
    }
}

/// Render `definition` with `vars`; a rendering failure belongs to `stage`.
pub(crate) fn render(
    stage: Stage,
    definition: &PromptDefinition,
    vars: &[(&str, &str)],
) -> Result<BuiltPrompt, PipelineError> {
    let variables: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    build_prompt(definition, &variables).map_err(|e| PipelineError::at(stage, e.to_string()))
}

pub(crate) fn request_for(prompt: &BuiltPrompt, config: &PipelineConfig) -> LlmRequest {
    let mut request = LlmRequest::new(prompt.user.clone(), config.model.clone())
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    if let Some(system) = &prompt.system {
        request = request.with_system(system.clone());
    }
    if prompt.metadata.json_output {
        request = request.with_json_mode();
    }

    request
}

/// Send `prompt` and return the reply text.
pub(crate) async fn complete(
    llm: &dyn LlmClient,
    stage: Stage,
    prompt: &BuiltPrompt,
    config: &PipelineConfig,
) -> Result<String, PipelineError> {
    let request = request_for(prompt, config);
    tracing::debug!(
        "{} prompt '{}':\n{}",
        stage,
        prompt.metadata.source_prompt_id,
        request.prompt
    );

    let response = with_timeout(stage, config.stage_timeout, llm.complete(&request)).await?;
    tracing::debug!("{} reply:\n{}", stage, response.content);

    Ok(response.content)
}
