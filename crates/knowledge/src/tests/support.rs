//! Scripted collaborators for pipeline tests.

use crate::rag::{Chunk, PipelineConfig, RagPipeline};
use crate::store::DocumentStore;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use veracity_core::{AppError, AppResult, PipelineSettings};
use veracity_llm::{LlmClient, LlmRequest, LlmResponse};
use veracity_prompt::PromptSet;

/// Which pipeline prompt a request was rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Relevance,
    Generate,
    FactCheck,
}

impl CallKind {
    fn of(request: &LlmRequest) -> Self {
        if request.prompt.contains("DOCUMENT EXCERPT:") {
            Self::Relevance
        } else if request.prompt.contains("GENERATED ANSWER:") {
            Self::FactCheck
        } else {
            Self::Generate
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub prompt: String,
}

/// Scripted reply for one call.
pub enum Reply {
    Text(String),
    Fail(String),
    Hang,
}

/// LLM client answering from per-prompt queues and recording every call.
#[derive(Default)]
pub struct ScriptedLlm {
    relevance: Mutex<VecDeque<Reply>>,
    generate: Mutex<VecDeque<Reply>>,
    factcheck: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn judge(self, score: u8) -> Self {
        self.push(
            CallKind::Relevance,
            Reply::Text(format!(
                r#"{{"relevance_score": {}, "reason": "scripted"}}"#,
                score
            )),
        )
    }

    pub fn answer(self, text: &str) -> Self {
        self.push(CallKind::Generate, Reply::Text(text.to_string()))
    }

    pub fn check(self, score: u32, unsupported: &[&str]) -> Self {
        let reply = serde_json::json!({
            "consistency_score": score,
            "supported_claims": ["scripted claim"],
            "unsupported_claims": unsupported,
            "verdict": format!("scripted {}", score),
        });
        self.push(CallKind::FactCheck, Reply::Text(reply.to_string()))
    }

    pub fn push(self, kind: CallKind, reply: Reply) -> Self {
        let queue = match kind {
            CallKind::Relevance => &self.relevance,
            CallKind::Generate => &self.generate,
            CallKind::FactCheck => &self.factcheck,
        };
        queue.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|c| c.kind == kind).count()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let kind = CallKind::of(request);
        self.calls.lock().unwrap().push(RecordedCall {
            kind,
            prompt: request.prompt.clone(),
        });

        let reply = {
            let queue = match kind {
                CallKind::Relevance => &self.relevance,
                CallKind::Generate => &self.generate,
                CallKind::FactCheck => &self.factcheck,
            };
            queue.lock().unwrap().pop_front()
        };

        match reply {
            Some(Reply::Text(text)) => Ok(LlmResponse::text(text, request.model.clone())),
            Some(Reply::Fail(message)) => Err(AppError::Llm(message)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(AppError::Llm("hung call was not cancelled".to_string()))
            }
            None => Err(AppError::Llm(format!("No scripted reply for {:?}", kind))),
        }
    }
}

/// Store returning a fixed list of chunks.
pub struct StaticStore {
    chunks: Vec<Chunk>,
    fail: bool,
    searches: Mutex<usize>,
}

impl StaticStore {
    pub fn with_chunks(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            fail: false,
            searches: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            chunks: Vec::new(),
            fail: true,
            searches: Mutex::new(0),
        }
    }

    pub fn searches(&self) -> usize {
        *self.searches.lock().unwrap()
    }
}

#[async_trait]
impl DocumentStore for StaticStore {
    async fn search(&self, _query: &str, k: usize) -> AppResult<Vec<Chunk>> {
        *self.searches.lock().unwrap() += 1;
        if self.fail {
            return Err(AppError::Knowledge("index file is corrupt".to_string()));
        }
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

pub fn chunk(id: &str, source: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        source: source.to_string(),
        location: format!("section {}", id),
        similarity: 0.42,
    }
}

/// Three governance passages in retrieval order.
pub fn governance_chunks() -> Vec<Chunk> {
    vec![
        chunk(
            "c1",
            "eu-ai-act.md",
            "Article 5 prohibits AI systems that deploy subliminal techniques and social scoring by public authorities.",
        ),
        chunk(
            "c2",
            "nist-ai-rmf.pdf",
            "The GOVERN function cultivates a culture of risk management across the AI lifecycle.",
        ),
        chunk(
            "c3",
            "eu-ai-act.md",
            "Providers of high-risk AI systems shall establish a risk management system.",
        ),
    ]
}

pub fn config() -> PipelineConfig {
    PipelineConfig::from_settings(&PipelineSettings::default(), "test-model")
}

pub fn pipeline(
    store: Arc<StaticStore>,
    llm: Arc<ScriptedLlm>,
    config: PipelineConfig,
) -> RagPipeline {
    RagPipeline::new(store, llm, PromptSet::builtin().unwrap(), config)
}
