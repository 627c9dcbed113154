//! End-to-end behaviour of the self-correcting loop with scripted services.

use super::support::*;
use crate::rag::PipelineState::*;
use crate::rag::{Confidence, PipelineError, RagResponse, Resolution, ResponseStatus, Stage};
use std::sync::Arc;
use std::time::Duration;

const QUESTION: &str = "What AI practices does the EU AI Act prohibit?";

#[tokio::test]
async fn test_accepts_first_answer_at_95() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(9)
            .judge(3)
            .judge(7)
            .answer("Article 5 prohibits subliminal techniques and social scoring [Source 1].")
            .check(95, &[]),
    );

    let outcome = pipeline(store, llm.clone(), config()).run(QUESTION).await.unwrap();

    let Resolution::Accepted(checked) = &outcome.resolution else {
        panic!("expected acceptance, got {:?}", outcome.resolution);
    };
    assert_eq!(checked.score(), 95.0);
    assert_eq!(checked.answer().attempt, 1);
    assert!(checked.report().unsupported_claims.is_empty());
    assert!(!outcome.retried);
    assert_eq!(outcome.retrieved, 3);
    assert_eq!(
        outcome.trace,
        vec![Retrieved, Filtered, Generated, Checked, Accepted]
    );

    assert_eq!(llm.count(CallKind::Relevance), 3);
    assert_eq!(llm.count(CallKind::Generate), 1);
    assert_eq!(llm.count(CallKind::FactCheck), 1);

    // Only chunks scoring at least 6 reach the generator, in retrieval order
    let context: Vec<&str> = checked
        .answer()
        .context
        .iter()
        .map(|s| s.chunk.id.as_str())
        .collect();
    assert_eq!(context, vec!["c1", "c3"]);

    let generate_prompt = llm
        .calls()
        .into_iter()
        .find(|c| c.kind == CallKind::Generate)
        .unwrap()
        .prompt;
    assert!(generate_prompt.contains("[Source 1]\nArticle 5 prohibits"));
    assert!(generate_prompt.contains("[Source 2]\nProviders of high-risk"));
    assert!(!generate_prompt.contains("GOVERN function"));

    let response = RagResponse::from_outcome(&outcome);
    assert_eq!(response.status, ResponseStatus::Accepted);
    assert_eq!(response.consistency_score, Some(95.0));
    assert_eq!(response.confidence, Some(Confidence::High));
    assert!(response.warning.is_none());
    assert_eq!(response.sources.len(), 2);
}

#[tokio::test]
async fn test_article_6_generates_from_the_three_relevant_of_five() {
    let mut chunks = governance_chunks();
    chunks.push(chunk(
        "c4",
        "eu-ai-act.md",
        "Article 6 classifies an AI system as high-risk when it is a safety component of a regulated product.",
    ));
    chunks.push(chunk(
        "c5",
        "iso-42001.pdf",
        "The organization shall determine the scope of its AI management system.",
    ));
    let store = Arc::new(StaticStore::with_chunks(chunks));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(6)
            .judge(2)
            .judge(8)
            .judge(10)
            .judge(5)
            .answer("Article 6 sets the classification rules for high-risk AI systems [Source 3].")
            .check(95, &[]),
    );

    let outcome = pipeline(store, llm.clone(), config())
        .run("What is Article 6 of the EU AI Act?")
        .await
        .unwrap();

    let Resolution::Accepted(checked) = &outcome.resolution else {
        panic!("expected acceptance, got {:?}", outcome.resolution);
    };
    assert!(!outcome.retried);
    assert_eq!(outcome.retrieved, 5);
    assert_eq!(llm.count(CallKind::Relevance), 5);
    assert_eq!(llm.count(CallKind::Generate), 1);

    let context: Vec<&str> = checked
        .answer()
        .context
        .iter()
        .map(|s| s.chunk.id.as_str())
        .collect();
    assert_eq!(context, vec!["c1", "c3", "c4"]);

    let generate_prompt = llm
        .calls()
        .into_iter()
        .find(|c| c.kind == CallKind::Generate)
        .unwrap()
        .prompt;
    assert!(generate_prompt.contains("[Source 3]\nArticle 6 classifies"));
    assert!(!generate_prompt.contains("[Source 4]"));
    assert!(!generate_prompt.contains("GOVERN function"));
    assert!(!generate_prompt.contains("AI management system"));
}

#[tokio::test]
async fn test_retry_accepted_at_92() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(8)
            .judge(8)
            .judge(8)
            .answer("Draft answer citing fines of 10% [Source 1].")
            .check(70, &["Fines of 10% of turnover"])
            .answer("Article 5 prohibits social scoring [Source 1].")
            .check(92, &[]),
    );

    let outcome = pipeline(store, llm.clone(), config()).run(QUESTION).await.unwrap();

    let Resolution::Accepted(checked) = &outcome.resolution else {
        panic!("expected acceptance, got {:?}", outcome.resolution);
    };
    assert_eq!(checked.score(), 92.0);
    assert_eq!(checked.answer().attempt, 2);
    assert_eq!(
        checked.answer().text,
        "Article 5 prohibits social scoring [Source 1]."
    );
    assert!(outcome.retried);
    assert_eq!(
        outcome.trace,
        vec![Retrieved, Filtered, Generated, Checked, Retried, Generated, Checked, Accepted]
    );

    // Retry regenerates from the same passages with the same prompt
    let generate_prompts: Vec<String> = llm
        .calls()
        .into_iter()
        .filter(|c| c.kind == CallKind::Generate)
        .map(|c| c.prompt)
        .collect();
    assert_eq!(generate_prompts.len(), 2);
    assert_eq!(generate_prompts[0], generate_prompts[1]);
    assert_eq!(llm.count(CallKind::Relevance), 3);

    // The second check is against the second answer
    let check_prompts: Vec<String> = llm
        .calls()
        .into_iter()
        .filter(|c| c.kind == CallKind::FactCheck)
        .map(|c| c.prompt)
        .collect();
    assert!(check_prompts[1].contains("Article 5 prohibits social scoring [Source 1]."));
    assert!(!check_prompts[1].contains("Draft answer"));

    let response = RagResponse::from_outcome(&outcome);
    assert!(response.retried);
    assert!(response.unsupported_claims.is_empty());
}

#[tokio::test]
async fn test_rejects_after_retry_with_better_answer() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(7)
            .judge(7)
            .judge(7)
            .answer("First answer")
            .check(70, &["claim A", "claim B"])
            .answer("Second answer")
            .check(80, &["claim B"]),
    );

    let outcome = pipeline(store, llm.clone(), config()).run(QUESTION).await.unwrap();

    let Resolution::Rejected { best, warning } = &outcome.resolution else {
        panic!("expected rejection, got {:?}", outcome.resolution);
    };
    assert_eq!(best.answer().text, "Second answer");
    assert_eq!(best.score(), 80.0);
    assert_eq!(best.report().unsupported_claims, vec!["claim B"]);
    assert!(warning.starts_with("Medium confidence (80%)"));
    assert!(outcome.retried);
    assert_eq!(outcome.trace.last(), Some(&Rejected));

    // Exactly one retry
    assert_eq!(llm.count(CallKind::Generate), 2);
    assert_eq!(llm.count(CallKind::FactCheck), 2);

    let response = RagResponse::from_outcome(&outcome);
    assert_eq!(response.status, ResponseStatus::LowConsistency);
    assert_eq!(response.answer, "Second answer");
    assert_eq!(response.consistency_score, Some(80.0));
    assert_eq!(response.unsupported_claims, vec!["claim B"]);
    assert!(response.warning.is_some());
}

#[tokio::test]
async fn test_rejection_tie_keeps_first_answer() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(7)
            .judge(7)
            .judge(7)
            .answer("First answer")
            .check(60, &["claim A"])
            .answer("Second answer")
            .check(60, &["claim C"]),
    );

    let outcome = pipeline(store, llm, config()).run(QUESTION).await.unwrap();

    let Resolution::Rejected { best, warning } = &outcome.resolution else {
        panic!("expected rejection, got {:?}", outcome.resolution);
    };
    assert_eq!(best.answer().text, "First answer");
    assert!(warning.starts_with("Low confidence (60%)"));
}

#[tokio::test]
async fn test_no_relevant_context_skips_generation() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(ScriptedLlm::new().judge(2).judge(5).judge(1));

    let outcome = pipeline(store, llm.clone(), config()).run(QUESTION).await.unwrap();

    assert!(matches!(outcome.resolution, Resolution::NoRelevantContext));
    assert!(outcome.checked().is_none());
    assert!(!outcome.retried);
    assert_eq!(outcome.trace, vec![Retrieved, Filtered, NoRelevantContext]);
    assert_eq!(llm.count(CallKind::Relevance), 3);
    assert_eq!(llm.count(CallKind::Generate), 0);
    assert_eq!(llm.count(CallKind::FactCheck), 0);

    let response = RagResponse::from_outcome(&outcome);
    assert_eq!(response.status, ResponseStatus::NoRelevantContext);
    assert!(response.consistency_score.is_none());
}

#[tokio::test]
async fn test_empty_retrieval_is_no_relevant_context() {
    let store = Arc::new(StaticStore::with_chunks(Vec::new()));
    let llm = Arc::new(ScriptedLlm::new());

    let outcome = pipeline(store, llm.clone(), config()).run(QUESTION).await.unwrap();

    assert!(matches!(outcome.resolution, Resolution::NoRelevantContext));
    assert_eq!(outcome.trace, vec![Retrieved, NoRelevantContext]);
    assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_judgment_excludes_chunk() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .push(CallKind::Relevance, Reply::Text("Very relevant!".to_string()))
            .push(
                CallKind::Relevance,
                Reply::Text("```json\n{\"relevance_score\": 8, \"reason\": \"fenced\"}\n```".to_string()),
            )
            .judge(12)
            .answer("GOVERN builds a risk culture [Source 1].")
            .check(91, &[]),
    );

    let outcome = pipeline(store, llm, config()).run(QUESTION).await.unwrap();

    let checked = outcome.checked().unwrap();
    let ids: Vec<&str> = checked
        .answer()
        .context
        .iter()
        .map(|s| s.chunk.id.as_str())
        .collect();
    assert_eq!(ids, vec!["c2"]);
    assert_eq!(checked.answer().context[0].reason, "fenced");
}

#[tokio::test]
async fn test_all_unreadable_judgments_are_relevance_error() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .push(CallKind::Relevance, Reply::Text("Very relevant!".to_string()))
            .push(CallKind::Relevance, Reply::Text("I'd say 9/10".to_string()))
            .push(
                CallKind::Relevance,
                Reply::Text("<html>502 Bad Gateway</html>".to_string()),
            ),
    );

    let err = pipeline(store, llm.clone(), config()).run(QUESTION).await.unwrap_err();

    assert!(matches!(err, PipelineError::Relevance(_)));
    assert_eq!(err.stage(), Stage::Relevance);
    assert!(err.to_string().contains("no readable relevance judgment for 3 chunks"));
    assert_eq!(llm.count(CallKind::Relevance), 3);
    assert_eq!(llm.count(CallKind::Generate), 0);
}

#[tokio::test]
async fn test_readable_low_scores_with_one_unreadable_is_no_context() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .push(CallKind::Relevance, Reply::Text("Very relevant!".to_string()))
            .judge(3)
            .judge(4),
    );

    let outcome = pipeline(store, llm, config()).run(QUESTION).await.unwrap();

    assert!(matches!(outcome.resolution, Resolution::NoRelevantContext));
}

#[tokio::test]
async fn test_top_k_limits_retrieval() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(ScriptedLlm::new().judge(1));
    let mut config = config();
    config.top_k = 1;

    let outcome = pipeline(store, llm.clone(), config).run(QUESTION).await.unwrap();

    assert_eq!(outcome.retrieved, 1);
    assert_eq!(llm.count(CallKind::Relevance), 1);
}

#[tokio::test]
async fn test_retry_disabled_rejects_first_attempt() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(9)
            .judge(9)
            .judge(9)
            .answer("Only answer")
            .check(75, &["claim"]),
    );
    let mut config = config();
    config.allow_retry = false;

    let outcome = pipeline(store, llm.clone(), config).run(QUESTION).await.unwrap();

    assert!(matches!(outcome.resolution, Resolution::Rejected { .. }));
    assert!(!outcome.retried);
    assert_eq!(llm.count(CallKind::Generate), 1);
    assert!(!outcome.trace.contains(&Retried));
}

#[tokio::test]
async fn test_fractional_score_warning_is_not_rounded_up() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(9)
            .judge(9)
            .judge(9)
            .answer("Only answer")
            .push(
                CallKind::FactCheck,
                Reply::Text(
                    r#"{"consistency_score": 89.6, "unsupported_claims": ["claim"]}"#.to_string(),
                ),
            ),
    );
    let mut config = config();
    config.allow_retry = false;

    let outcome = pipeline(store, llm, config).run(QUESTION).await.unwrap();

    let Resolution::Rejected { best, warning } = &outcome.resolution else {
        panic!("expected rejection, got {:?}", outcome.resolution);
    };
    assert_eq!(best.score(), 89.6);
    assert!(warning.starts_with("Medium confidence (89.6%)"));
}

#[tokio::test]
async fn test_custom_threshold() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(9)
            .judge(9)
            .judge(9)
            .answer("Answer")
            .check(75, &[]),
    );
    let mut config = config();
    config.accept_threshold = 70.0;

    let outcome = pipeline(store, llm, config).run(QUESTION).await.unwrap();

    assert!(matches!(outcome.resolution, Resolution::Accepted(_)));
}

#[tokio::test]
async fn test_malformed_fact_check_is_scoring_error() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(9)
            .judge(9)
            .judge(9)
            .answer("Answer")
            .push(
                CallKind::FactCheck,
                Reply::Text(r#"{"verdict": "looks fine"}"#.to_string()),
            ),
    );

    let err = pipeline(store, llm, config()).run(QUESTION).await.unwrap_err();

    assert!(matches!(err, PipelineError::Scoring(_)));
}

#[tokio::test]
async fn test_generation_timeout_is_stage_error() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(9)
            .judge(9)
            .judge(9)
            .push(CallKind::Generate, Reply::Hang),
    );
    let mut config = config();
    config.stage_timeout = Duration::from_millis(50);

    let err = pipeline(store, llm.clone(), config).run(QUESTION).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Timeout {
            stage: Stage::Generation,
            ..
        }
    ));
    assert_eq!(llm.count(CallKind::FactCheck), 0);
}

#[tokio::test]
async fn test_generation_failure_is_not_a_score() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(9)
            .judge(9)
            .judge(9)
            .push(CallKind::Generate, Reply::Fail("503 Service Unavailable".to_string())),
    );

    let err = pipeline(store, llm, config()).run(QUESTION).await.unwrap_err();

    assert!(matches!(err, PipelineError::Generation(_)));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_empty_generation_is_error() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(ScriptedLlm::new().judge(9).judge(9).judge(9).answer("   \n"));

    let err = pipeline(store, llm, config()).run(QUESTION).await.unwrap_err();

    assert!(matches!(err, PipelineError::Generation(_)));
}

#[tokio::test]
async fn test_retry_failure_surfaces_stage_error() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(9)
            .judge(9)
            .judge(9)
            .answer("First answer")
            .check(50, &["claim"])
            .answer("Second answer")
            .push(CallKind::FactCheck, Reply::Fail("connection reset".to_string())),
    );

    let err = pipeline(store, llm, config()).run(QUESTION).await.unwrap_err();

    assert!(matches!(err, PipelineError::Scoring(_)));
}

#[tokio::test]
async fn test_relevance_transport_failure_aborts() {
    let store = Arc::new(StaticStore::with_chunks(governance_chunks()));
    let llm = Arc::new(
        ScriptedLlm::new()
            .judge(9)
            .push(CallKind::Relevance, Reply::Fail("rate limited".to_string())),
    );

    let err = pipeline(store, llm.clone(), config()).run(QUESTION).await.unwrap_err();

    assert!(matches!(err, PipelineError::Relevance(_)));
    assert_eq!(llm.count(CallKind::Generate), 0);
}

#[tokio::test]
async fn test_store_failure_is_retrieval_error() {
    let store = Arc::new(StaticStore::failing());
    let llm = Arc::new(ScriptedLlm::new());

    let err = pipeline(store.clone(), llm.clone(), config())
        .run(QUESTION)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Retrieval(_)));
    assert_eq!(store.searches(), 1);
    assert!(llm.calls().is_empty());
}
