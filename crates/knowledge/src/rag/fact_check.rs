//! Consistency scoring of an answer against its passages.

use crate::rag::decision::format_percent;
use crate::rag::error::{PipelineError, Stage};
use crate::rag::generator::build_context;
use crate::rag::json::extract_object;
use crate::rag::stage::{complete, render};
use crate::rag::types::{Answer, CheckedAnswer, ConsistencyReport, PipelineConfig};
use serde_json::{Map, Value};
use tracing::{info, instrument};
use veracity_llm::LlmClient;
use veracity_prompt::PromptDefinition;

/// SHA-256 of an answer text, hex encoded.
pub fn answer_digest(text: &str) -> String {
    crate::sha256_hex(text.as_bytes())
}

/// Fact-check `answer` against the passages it was generated from.
#[instrument(skip_all, fields(attempt = answer.attempt))]
pub async fn check_answer(
    llm: &dyn LlmClient,
    prompt: &PromptDefinition,
    question: &str,
    answer: Answer,
    config: &PipelineConfig,
) -> Result<CheckedAnswer, PipelineError> {
    let context = build_context(&answer.context);
    let built = render(
        Stage::Scoring,
        prompt,
        &[
            ("question", question),
            ("context", &context),
            ("answer", &answer.text),
        ],
    )?;

    let reply = complete(llm, Stage::Scoring, &built, config).await?;
    let report = parse_report(&reply, &answer.text)?;

    info!(
        "Attempt {} consistency {} ({} unsupported claims)",
        answer.attempt,
        format_percent(report.score),
        report.unsupported_claims.len()
    );

    CheckedAnswer::new(answer, report)
}

/// Read a checker reply. Missing or malformed required fields are errors.
pub(crate) fn parse_report(reply: &str, answer_text: &str) -> Result<ConsistencyReport, PipelineError> {
    let object = extract_object(reply)
        .ok_or_else(|| PipelineError::Scoring("Reply contains no JSON object".to_string()))?;

    let score = parse_score(&object)?;

    let unsupported_claims = match object.get("unsupported_claims") {
        Some(value) => string_list(value).ok_or_else(|| {
            PipelineError::Scoring("unsupported_claims must be a list of strings".to_string())
        })?,
        None => {
            return Err(PipelineError::Scoring(
                "Reply is missing unsupported_claims".to_string(),
            ))
        }
    };

    let supported_claims = object
        .get("supported_claims")
        .and_then(string_list)
        .unwrap_or_default();

    let verdict = object
        .get("verdict")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    Ok(ConsistencyReport {
        score,
        unsupported_claims,
        supported_claims,
        verdict,
        answer_digest: answer_digest(answer_text),
    })
}

fn parse_score(object: &Map<String, Value>) -> Result<f64, PipelineError> {
    let value = object
        .get("consistency_score")
        .ok_or_else(|| PipelineError::Scoring("Reply is missing consistency_score".to_string()))?;

    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| PipelineError::Scoring(format!("Unreadable consistency_score: {}", value)))?;

    if !(0.0..=100.0).contains(&score) {
        return Err(PipelineError::Scoring(format!(
            "consistency_score {} is outside 0-100",
            score
        )));
    }

    Ok(score)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}
