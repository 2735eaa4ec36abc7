//! Configuration for the pipeline optimizer.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.
//!
//! The pipeline table is read once at startup and handed to the
//! [`Orchestrator`](crate::orchestrator::Orchestrator); nothing mutates it
//! afterwards.

use crate::chunker::ChunkConfig;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Chat-completion model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://api.openai.com")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name (e.g., "gpt-4o-mini")
    pub model: String,

    /// Maximum tokens for response (optional)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation (optional)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Ask the server for a JSON object response.
    #[serde(default)]
    pub json_output: bool,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            json_output: false,
        }
    }
}

impl LlmConfig {
    /// Defaults for the judge: a stronger model, deterministic, JSON output.
    pub fn judge_default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            json_output: true,
            ..Default::default()
        }
    }
}

/// Embedding endpoint settings. Empty fields fall back to the `llm` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
}

/// One RAG configuration under comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Short identifier, e.g. "A".
    pub id: String,
    /// Human readable summary shown to the judge.
    pub description: String,
    /// Window size in characters.
    pub chunk_size: usize,
    /// Embedding model used by this configuration only.
    pub embedding_model: String,
}

impl PipelineConfig {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        chunk_size: usize,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            chunk_size,
            embedding_model: embedding_model.into(),
        }
    }

    /// The default A..D comparison table.
    pub fn default_table() -> Vec<PipelineConfig> {
        vec![
            PipelineConfig::new(
                "A",
                "Chunk=256, Embedding=text-embedding-3-small",
                256,
                "text-embedding-3-small",
            ),
            PipelineConfig::new(
                "B",
                "Chunk=512, Embedding=text-embedding-3-large",
                512,
                "text-embedding-3-large",
            ),
            PipelineConfig::new(
                "C",
                "Chunk=1024, Embedding=text-embedding-3-small",
                1024,
                "text-embedding-3-small",
            ),
            PipelineConfig::new(
                "D",
                "Chunk=512, Embedding=text-embedding-3-large (alt)",
                512,
                "text-embedding-3-large",
            ),
        ]
    }
}

/// Check a pipeline table before anything is registered.
pub fn validate_pipelines(pipelines: &[PipelineConfig]) -> Result<()> {
    if pipelines.is_empty() {
        return Err(RagError::InvalidConfig(
            "at least one pipeline must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for pipeline in pipelines {
        let id = pipeline.id.trim();
        if id.is_empty() || id != pipeline.id {
            return Err(RagError::InvalidConfig(format!(
                "pipeline id '{}' must be non-empty without surrounding whitespace",
                pipeline.id
            )));
        }
        if !seen.insert(id) {
            return Err(RagError::InvalidConfig(format!(
                "duplicate pipeline id '{}'",
                id
            )));
        }
        if pipeline.embedding_model.trim().is_empty() {
            return Err(RagError::InvalidConfig(format!(
                "pipeline '{}' has no embedding model",
                id
            )));
        }
        ChunkConfig::for_chunk_size(pipeline.chunk_size).map_err(|e| match e {
            RagError::InvalidConfig(msg) => {
                RagError::InvalidConfig(format!("pipeline '{}': {}", id, msg))
            }
            other => other,
        })?;
    }

    Ok(())
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Answer generation model.
    pub llm: LlmConfig,
    /// Comparative judge model.
    pub judge: LlmConfig,
    /// Embedding endpoint.
    pub embedding: EmbeddingConfig,
    /// Configurations under comparison, in output order.
    pub pipelines: Vec<PipelineConfig>,
    /// Chunks retrieved per question.
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            judge: LlmConfig::judge_default(),
            embedding: EmbeddingConfig::default(),
            pipelines: PipelineConfig::default_table(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileSection>,
    judge: Option<LlmFileSection>,
    embedding: Option<EmbeddingConfig>,
    pipelines: Option<Vec<PipelineConfig>>,
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LlmFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    json_output: Option<bool>,
}

impl LlmFileSection {
    fn apply(self, target: &mut LlmConfig) {
        if let Some(api_base) = self.api_base {
            target.api_base = api_base;
        }
        if let Some(api_key) = self.api_key {
            target.api_key = api_key;
        }
        if let Some(model) = self.model {
            target.model = model;
        }
        if let Some(max_tokens) = self.max_tokens {
            target.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            target.temperature = temperature;
        }
        if let Some(json_output) = self.json_output {
            target.json_output = json_output;
        }
    }
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_API_KEY, LLM_MODEL, JUDGE_MODEL, ...)
    /// 2. Config file (~/.config/rag-pipeline-optimizer/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(api_base) = env::var("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(max_tokens) = env::var("LLM_MAX_TOKENS") {
            if let Ok(tokens) = max_tokens.parse() {
                self.llm.max_tokens = tokens;
            }
        }

        if let Ok(temperature) = env::var("LLM_TEMPERATURE") {
            if let Ok(temp) = temperature.parse() {
                self.llm.temperature = temp;
            }
        }

        if let Ok(model) = env::var("JUDGE_MODEL") {
            self.judge.model = model;
        }

        if let Ok(api_base) = env::var("EMBEDDING_API_BASE") {
            self.embedding.api_base = api_base;
        }

        if let Ok(api_key) = env::var("EMBEDDING_API_KEY") {
            self.embedding.api_key = api_key;
        }

        if let Ok(top_k) = env::var("RAG_TOP_K") {
            if let Ok(k) = top_k.parse() {
                self.top_k = k;
            }
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML document on top of the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| RagError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(llm) = file_config.llm {
            llm.apply(&mut config.llm);
        }
        if let Some(judge) = file_config.judge {
            judge.apply(&mut config.judge);
        }
        if let Some(embedding) = file_config.embedding {
            config.embedding = embedding;
        }
        if let Some(pipelines) = file_config.pipelines {
            config.pipelines = pipelines;
        }
        if let Some(top_k) = file_config.top_k {
            config.top_k = top_k;
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-pipeline-optimizer")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Judge settings with connection details inherited from `llm` where unset.
    pub fn judge_config(&self) -> LlmConfig {
        let mut judge = self.judge.clone();
        if judge.api_base.is_empty() {
            judge.api_base = self.llm.api_base.clone();
        }
        if judge.api_key.is_empty() {
            judge.api_key = self.llm.api_key.clone();
        }
        judge
    }

    /// Embedding base URL and key, inherited from `llm` where unset.
    pub fn embedding_endpoint(&self) -> (String, String) {
        let base = if self.embedding.api_base.is_empty() {
            self.llm.api_base.clone()
        } else {
            self.embedding.api_base.clone()
        };
        let key = if self.embedding.api_key.is_empty() {
            self.llm.api_key.clone()
        } else {
            self.embedding.api_key.clone()
        };
        (base, key)
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(RagError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(RagError::Config(
                "LLM API key is required. Set LLM_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.model.is_empty() || self.judge.model.is_empty() {
            return Err(RagError::Config(
                "Generation and judge models are required. Set LLM_MODEL / JUDGE_MODEL or add to config file."
                    .to_string(),
            ));
        }

        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }

        validate_pipelines(&self.pipelines)
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_llm(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.llm.api_base.is_empty());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.judge.model, "gpt-4o");
        assert!(config.judge.json_output);
        assert_eq!(config.top_k, DEFAULT_TOP_K);

        let ids: Vec<_> = config.pipelines.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_validate_fails_without_required_fields() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_llm_validates() {
        let config = Config::with_llm("https://api.example.com", "test-key", "gpt-4o-mini");
        assert!(config.validate().is_ok());
        assert_eq!(config.judge_config().api_key, "test-key");
        assert_eq!(
            config.embedding_endpoint(),
            ("https://api.example.com".to_string(), "test-key".to_string())
        );
    }

    #[test]
    fn test_duplicate_pipeline_ids_rejected() {
        let table = vec![
            PipelineConfig::new("A", "first", 256, "m"),
            PipelineConfig::new("A", "second", 512, "m"),
        ];
        let err = validate_pipelines(&table).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let table = vec![PipelineConfig::new("A", "broken", 0, "m")];
        assert!(matches!(
            validate_pipelines(&table),
            Err(RagError::InvalidConfig(_))
        ));
        assert!(validate_pipelines(&[]).is_err());
    }

    #[test]
    fn test_yaml_overrides_pipelines() {
        let yaml = r#"
llm:
  api_base: https://llm.local
  api_key: secret
judge:
  model: judge-large
top_k: 2
pipelines:
  - id: X
    description: tiny windows
    chunk_size: 64
    embedding_model: mini
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.llm.api_base, "https://llm.local");
        assert_eq!(config.judge.model, "judge-large");
        assert!(config.judge.json_output);
        assert_eq!(config.top_k, 2);
        assert_eq!(config.pipelines.len(), 1);
        assert_eq!(config.pipelines[0].chunk_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "embedding:\n  api_base: https://embed.local\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.embedding.api_base, "https://embed.local");
        assert_eq!(config.pipelines.len(), 4);
    }

    #[test]
    fn test_yaml_sets_json_output() {
        let yaml = "llm:\n  json_output: true\njudge:\n  json_output: false\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.llm.json_output);
        assert!(!config.judge.json_output);
        assert_eq!(config.judge.model, "gpt-4o");
    }
}
