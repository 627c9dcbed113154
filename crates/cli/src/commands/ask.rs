//! Ask command handler.
//!
//! Runs a question through the self-correcting pipeline and prints the
//! accepted or annotated answer.

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use veracity_core::{config::AppConfig, AppError, AppResult};
use veracity_knowledge::rag::{format_percent, Confidence, RagResponse, ResponseStatus};
use veracity_knowledge::PipelineConfig;
use veracity_llm::{create_client, ProviderType};

/// Ask a question and get a fact-checked answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Knowledge base to answer from (default: pipeline.knowledgeBase)
    #[arg(short, long)]
    pub base: Option<String>,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<u32>,

    /// Minimum consistency percentage for acceptance
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Return the first answer even when it scores below the threshold
    #[arg(long)]
    pub no_retry: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.question_text()?;

        let mut settings = config.pipeline.clone();
        if let Some(top_k) = self.top_k {
            settings.top_k = top_k;
        }
        if let Some(threshold) = self.threshold {
            settings.accept_threshold = threshold;
        }
        if self.no_retry {
            settings.allow_retry = false;
        }
        let base = self.base.clone().unwrap_or_else(|| settings.knowledge_base.clone());

        let mut effective = config.clone();
        effective.pipeline = settings;
        effective.validate()?;

        let provider = effective.provider.to_lowercase();
        let model = if effective.model.is_empty() {
            ProviderType::parse(&provider)
                .map(|p| p.default_model().to_string())
                .unwrap_or_default()
        } else {
            effective.model.clone()
        };

        let endpoint = effective.resolve_endpoint(&provider);
        let api_key = effective.resolve_api_key(&provider);
        let timeout = Duration::from_secs(effective.resolve_timeout_secs(&provider));
        let client = create_client(&provider, endpoint.as_deref(), api_key.as_deref(), timeout)
            .map_err(AppError::Config)?;

        tracing::info!(
            "Answering from base '{}' with {}/{}",
            base,
            client.provider_name(),
            model
        );

        let pipeline_config = PipelineConfig::from_settings(&effective.pipeline, model);
        let outcome =
            veracity_knowledge::ask(&config.workspace, &base, &question, client, pipeline_config)
                .await?;

        tracing::debug!("Pipeline trace: {:?}", outcome.trace);

        let response = RagResponse::from_outcome(&outcome);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            print_human(&response);
        }

        Ok(())
    }

    fn question_text(&self) -> AppResult<String> {
        let text = match (&self.question, &self.file) {
            (Some(q), _) => q.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read question file {:?}: {}", path, e))
            })?,
            (None, None) => String::new(),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Config("No question provided".to_string()));
        }
        Ok(text.to_string())
    }
}

fn print_human(response: &RagResponse) {
    if let Some(ref warning) = response.warning {
        println!("Warning: {}", warning);
        println!();
    }

    println!("Answer:");
    println!("{}", response.answer);

    if response.status == ResponseStatus::NoRelevantContext {
        return;
    }

    println!();
    if let (Some(score), Some(confidence)) = (response.consistency_score, response.confidence) {
        let band = match confidence {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        };
        let retried = if response.retried { ", after one retry" } else { "" };
        println!(
            "Consistency: {} ({} confidence{})",
            format_percent(score),
            band,
            retried
        );
    }

    if !response.unsupported_claims.is_empty() {
        println!("Unsupported claims:");
        for claim in &response.unsupported_claims {
            println!("- {}", claim);
        }
    }

    println!();
    if response.sources.is_empty() {
        println!("Sources: (no sources available)");
    } else {
        println!("Sources:");
        for source in &response.sources {
            println!(
                "- {} ({}, relevance {}/10)",
                source.source, source.location, source.relevance
            );
        }
    }
}
