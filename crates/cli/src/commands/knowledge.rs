//! Knowledge command handler.
//!
//! Handles local knowledge base management.

use clap::{Args, Subcommand};
use std::path::PathBuf;
use veracity_core::{config::AppConfig, AppResult};
use veracity_knowledge::{LearnOptions, SearchOptions};

/// Knowledge base management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Learn from local documents (.txt, .md, .pdf)
    Learn(KnowledgeLearnCommand),
    /// Raw similarity search, without relevance judging
    Search(KnowledgeSearchCommand),
    /// Clean up knowledge base
    Clean(KnowledgeCleanCommand),
    /// Show knowledge base statistics
    Stats(KnowledgeStatsCommand),
}

/// Learn from sources
#[derive(Args, Debug)]
pub struct KnowledgeLearnCommand {
    /// Knowledge base name
    pub base: String,

    /// Files or directories to learn from
    #[arg(long, required = true)]
    pub path: Vec<PathBuf>,

    /// Keep only paths containing this substring
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip paths containing this substring
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Reset base before learning
    #[arg(long)]
    pub reset: bool,

    /// Embedding provider (ollama, hashed)
    #[arg(long)]
    pub embedding_provider: Option<String>,

    /// Embedding model
    #[arg(long)]
    pub embedding_model: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeLearnCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge learn command for base '{}'", self.base);

        let options = LearnOptions {
            base_name: self.base.clone(),
            paths: self.path.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            reset: self.reset,
            provider: self.embedding_provider.clone(),
            model: self.embedding_model.clone(),
        };

        let stats = veracity_knowledge::learn(&config.workspace, options).await?;

        if self.json {
            let output = serde_json::json!({
                "base": self.base,
                "sourcesCount": stats.sources_count,
                "chunksCount": stats.chunks_count,
                "unchangedCount": stats.unchanged_count,
                "failedCount": stats.failed_count,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Learned {} sources ({} chunks, {} bytes) in {:.2}s",
                stats.sources_count, stats.chunks_count, stats.bytes_processed, stats.duration_secs
            );
            if stats.unchanged_count > 0 {
                println!("  {} unchanged, skipped", stats.unchanged_count);
            }
            if stats.failed_count > 0 {
                println!("  {} failed (see log)", stats.failed_count);
            }
        }

        Ok(())
    }
}

/// Search a knowledge base
#[derive(Args, Debug)]
pub struct KnowledgeSearchCommand {
    /// Knowledge base name
    pub base: String,

    /// Query text
    pub query: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeSearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge search command for base '{}'", self.base);

        let options = SearchOptions {
            base_name: self.base.clone(),
            query: self.query.clone(),
            top_k: self.top_k,
        };

        let chunks = veracity_knowledge::search(&config.workspace, options).await?;

        if self.json {
            let output: Vec<_> = chunks
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "source": c.source,
                        "location": c.location,
                        "similarity": c.similarity,
                        "text": c.text,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if chunks.is_empty() {
            println!("No matching chunks");
        } else {
            for (i, chunk) in chunks.iter().enumerate() {
                println!(
                    "{}. {} ({}) score {:.3}",
                    i + 1,
                    chunk.source,
                    chunk.location,
                    chunk.similarity
                );
                println!("   {}", chunk.text.split_whitespace().collect::<Vec<_>>().join(" "));
            }
        }

        Ok(())
    }
}

/// Clean knowledge base
#[derive(Args, Debug)]
pub struct KnowledgeCleanCommand {
    /// Knowledge base name
    pub base: String,
}

impl KnowledgeCleanCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge clean command for base '{}'", self.base);

        veracity_knowledge::clean(&config.workspace, &self.base)?;

        println!("Knowledge base '{}' cleaned", self.base);

        Ok(())
    }
}

/// Show knowledge base stats
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Knowledge base name
    pub base: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge stats command for base '{}'", self.base);

        let stats = veracity_knowledge::stats(&config.workspace, &self.base)?;

        if self.json {
            let output = serde_json::json!({
                "base": stats.base_name,
                "sourcesCount": stats.sources_count,
                "chunksCount": stats.chunks_count,
                "dbSizeBytes": stats.db_size_bytes,
                "embedding": stats.embedding,
                "lastLearnAt": stats.last_learn_at,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Knowledge base: {}", stats.base_name);
            println!("  Sources: {}", stats.sources_count);
            println!("  Chunks: {}", stats.chunks_count);
            println!("  Embedding: {}", stats.embedding);
            println!("  DB size: {} bytes", stats.db_size_bytes);
            if let Some(last_learn) = stats.last_learn_at {
                println!("  Last learn: {}", last_learn);
            }
        }

        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Learn(cmd) => cmd.execute(config).await,
            KnowledgeAction::Search(cmd) => cmd.execute(config).await,
            KnowledgeAction::Clean(cmd) => cmd.execute(config),
            KnowledgeAction::Stats(cmd) => cmd.execute(config),
        }
    }
}
