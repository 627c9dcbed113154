//! Configuration management for Veracity.
//!
//! Configuration is merged from several sources, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.veracity/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The resulting `AppConfig` is passed explicitly to every component; nothing
//! reads process-wide state after startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers with a client implementation.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "groq"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .veracity/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("ollama", "openai", "groq")
    pub provider: String,

    /// Model identifier for generation and judging
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log format ("pretty" or "json")
    pub log_format: String,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Self-correcting pipeline settings
    pub pipeline: PipelineSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// Any OpenAI-compatible chat completions endpoint (OpenAI, Groq, vLLM)
    OpenAiCompatible {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
        timeout: Option<u64>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAiCompatible { model, .. } => model,
            Self::Ollama { model, .. } => model,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAiCompatible { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// Request timeout in seconds, if configured.
    pub fn timeout(&self) -> Option<u64> {
        match self {
            Self::OpenAiCompatible { timeout, .. } | Self::Ollama { timeout, .. } => *timeout,
        }
    }
}

/// Settings for the relevance → generate → fact-check loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Knowledge base queried when none is given on the command line
    pub knowledge_base: String,

    /// Number of chunks retrieved from the document store
    pub top_k: u32,

    /// Minimum relevance score (1-10) for a chunk to reach the generator
    pub relevance_cutoff: u8,

    /// Minimum consistency percentage for an answer to be accepted
    pub accept_threshold: f64,

    /// Regenerate once when the first answer scores below the threshold
    pub allow_retry: bool,

    /// Upper bound on any single external call, in seconds
    pub stage_timeout_secs: u64,

    /// Sampling temperature for every LLM call
    pub temperature: f32,

    /// Completion token limit for every LLM call
    pub max_tokens: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            knowledge_base: "governance".to_string(),
            top_k: 5,
            relevance_cutoff: 6,
            accept_threshold: 90.0,
            allow_retry: true,
            stage_timeout_secs: 60,
            temperature: 0.0,
            max_tokens: 1000,
        }
    }
}

impl PipelineSettings {
    /// Check that every setting is inside its meaningful range.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k == 0 {
            return Err(AppError::Config("pipeline.topK must be at least 1".to_string()));
        }

        if !(1..=10).contains(&self.relevance_cutoff) {
            return Err(AppError::Config(format!(
                "pipeline.relevanceCutoff must be between 1 and 10, got {}",
                self.relevance_cutoff
            )));
        }

        if !(0.0..=100.0).contains(&self.accept_threshold) {
            return Err(AppError::Config(format!(
                "pipeline.acceptThreshold must be between 0 and 100, got {}",
                self.accept_threshold
            )));
        }

        if self.stage_timeout_secs == 0 {
            return Err(AppError::Config(
                "pipeline.stageTimeoutSecs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    pipeline: Option<PipelineSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    format: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            log_format: "pretty".to_string(),
            verbose: false,
            no_color: false,
            llm: None,
            pipeline: PipelineSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `VERACITY_WORKSPACE`: Override workspace path
    /// - `VERACITY_CONFIG`: Path to config file
    /// - `VERACITY_PROVIDER`: LLM provider
    /// - `VERACITY_MODEL`: Model identifier
    /// - `VERACITY_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use veracity_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("VERACITY_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("VERACITY_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("VERACITY_PROVIDER") {
            config.switch_provider(provider);
        }

        if let Ok(model) = std::env::var("VERACITY_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("VERACITY_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Path of the YAML config file this configuration reads.
    pub fn config_path(&self) -> PathBuf {
        match self.config_file {
            Some(ref cf) => cf.clone(),
            None => self.veracity_dir().join("config.yaml"),
        }
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and YAML.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        log_format: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.switch_provider(provider);
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = log_format {
            self.log_format = log_format;
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Make `provider` active. The model follows the provider's config block;
    /// an empty model means "the provider's default".
    pub fn switch_provider(&mut self, provider: String) {
        if provider == self.provider {
            return;
        }
        self.model = self
            .get_provider_config(&provider)
            .map(|pc| pc.model().to_string())
            .unwrap_or_default();
        self.provider = provider;
    }

    /// Get the path to the .veracity directory.
    pub fn veracity_dir(&self) -> PathBuf {
        self.workspace.join(".veracity")
    }

    /// Ensure the .veracity directory exists.
    pub fn ensure_veracity_dir(&self) -> AppResult<()> {
        let dir = self.veracity_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .veracity directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get a provider's configuration block, if the config file defines one.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint override for a provider.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint())
            .map(str::to_string)
    }

    /// HTTP timeout for a provider: its own setting, else the pipeline stage timeout.
    pub fn resolve_timeout_secs(&self, provider: &str) -> u64 {
        self.get_provider_config(provider)
            .and_then(|pc| pc.timeout())
            .unwrap_or(self.pipeline.stage_timeout_secs)
    }

    /// Resolve the API key for a provider.
    ///
    /// `VERACITY_API_KEY` wins, then the provider's `apiKeyEnv`, then the
    /// conventional variable for well-known hosted providers.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        let env_var = match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAiCompatible { api_key_env, .. }) => Some(api_key_env.clone()),
            Some(ProviderConfig::Ollama { .. }) => None,
            None => default_api_key_env(provider).map(str::to_string),
        };

        env_var.and_then(|var| std::env::var(var).ok())
    }

    /// Validate configuration for the active provider and the pipeline.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.to_lowercase();

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider != "ollama" && self.resolve_api_key(&provider).is_none() {
            let hint = match self.get_provider_config(&provider) {
                Some(ProviderConfig::OpenAiCompatible { api_key_env, .. }) => api_key_env.clone(),
                _ => default_api_key_env(&provider)
                    .unwrap_or("VERACITY_API_KEY")
                    .to_string(),
            };
            return Err(AppError::Config(format!(
                "API key for provider '{}' not found. Set {} or VERACITY_API_KEY",
                provider, hint
            )));
        }

        self.pipeline.validate()
    }
}

/// Conventional API key variable for hosted providers.
fn default_api_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "groq" => Some("GROQ_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.pipeline.top_k, 5);
        assert_eq!(config.pipeline.relevance_cutoff, 6);
        assert_eq!(config.pipeline.accept_threshold, 90.0);
        assert!(config.pipeline.allow_retry);
        assert!(!config.verbose);
    }

    #[test]
    fn test_veracity_dir() {
        let config = AppConfig::default();
        assert!(config.veracity_dir().ends_with(".veracity"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("groq".to_string()),
            Some("llama-3.3-70b-versatile".to_string()),
            None,
            Some("json".to_string()),
            true,
            false,
        );

        assert_eq!(overridden.provider, "groq");
        assert_eq!(overridden.model, "llama-3.3-70b-versatile");
        assert_eq!(overridden.log_format, "json");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_switch_provider_drops_foreign_model() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            Some("groq".to_string()),
            None,
            None,
            None,
            false,
            false,
        );

        assert_eq!(overridden.provider, "groq");
        assert!(overridden.model.is_empty());
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: groq
  providers:
    groq:
      apiKeyEnv: VERACITY_TEST_GROQ_KEY
      model: llama-3.3-70b-versatile
      endpoint: https://api.groq.com/openai/v1
      timeout: 20
    ollama:
      endpoint: http://localhost:11434
      model: llama3.2
pipeline:
  topK: 8
  relevanceCutoff: 7
  allowRetry: false
logging:
  level: warn
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.provider, "groq");
        assert_eq!(merged.model, "llama-3.3-70b-versatile");
        assert_eq!(merged.pipeline.top_k, 8);
        assert_eq!(merged.pipeline.relevance_cutoff, 7);
        assert!(!merged.pipeline.allow_retry);
        // Unspecified pipeline fields keep their defaults
        assert_eq!(merged.pipeline.accept_threshold, 90.0);
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);

        assert_eq!(
            merged.resolve_endpoint("groq").as_deref(),
            Some("https://api.groq.com/openai/v1")
        );
        assert_eq!(merged.resolve_timeout_secs("groq"), 20);
        assert_eq!(merged.resolve_timeout_secs("ollama"), 60);
        assert!(matches!(
            merged.get_provider_config("ollama"),
            Some(ProviderConfig::Ollama { .. })
        ));
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-explicit".to_string());
        assert_eq!(config.resolve_api_key("groq").as_deref(), Some("sk-explicit"));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_hosted_provider_needs_key() {
        let mut config = AppConfig::default();
        config.provider = "openai".to_string();
        config.llm = Some(LlmConfig {
            active_provider: "openai".to_string(),
            providers: HashMap::from([(
                "openai".to_string(),
                ProviderConfig::OpenAiCompatible {
                    api_key_env: "VERACITY_TEST_UNSET_KEY_VAR".to_string(),
                    model: "gpt-4o-mini".to_string(),
                    endpoint: None,
                    timeout: None,
                },
            )]),
        });

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("VERACITY_TEST_UNSET_KEY_VAR"));
    }

    #[test]
    fn test_pipeline_settings_ranges() {
        let mut settings = PipelineSettings::default();
        assert!(settings.validate().is_ok());

        settings.relevance_cutoff = 11;
        assert!(settings.validate().is_err());

        settings = PipelineSettings {
            accept_threshold: 120.0,
            ..PipelineSettings::default()
        };
        assert!(settings.validate().is_err());

        settings = PipelineSettings {
            top_k: 0,
            ..PipelineSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
