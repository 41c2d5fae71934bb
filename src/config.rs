//! Configuration for chunk-bench.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::chunker::{ChunkConfig, DEFAULT_RETRIEVAL_K, default_configs, validate_configs};
use crate::error::{ChunkBenchError, Result};
use crate::retrieval::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

/// LLM configuration, shared by the judge and the OpenAI embedder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://openrouter.ai/api")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name used for judging
    pub model: String,

    /// Maximum tokens for response (optional)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation (optional)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing, no model download.
    Hashing,
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    OpenAi,
    /// Local sentence-transformers BERT (requires `local-embeddings`).
    Bert,
}

impl FromStr for EmbeddingBackend {
    type Err = ChunkBenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashing" | "hash" => Ok(EmbeddingBackend::Hashing),
            "openai" => Ok(EmbeddingBackend::OpenAi),
            "bert" | "local" => Ok(EmbeddingBackend::Bert),
            other => Err(ChunkBenchError::Config(format!(
                "unknown embedding provider '{}' (expected hashing, openai or bert)",
                other
            ))),
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    /// Model identifier for the openai and bert backends.
    pub model: String,
    /// Vector size for the hashing backend.
    pub dims: usize,
    /// Texts per embedding call.
    pub batch_size: usize,
    /// Concurrent embedding calls per index build.
    pub workers: usize,
    pub metric: DistanceMetric,
    /// Per-request timeout for remote embedding calls.
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Hashing,
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dims: 256,
            batch_size: 32,
            workers: 4,
            metric: DistanceMetric::SquaredL2,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Reasoning-oracle call policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Timeout for a single oracle attempt.
    pub timeout_secs: u64,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub backoff_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            backoff_ms: 500,
        }
    }
}

/// Benchmark settings: the configurations to compare and query defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSettings {
    pub configs: Vec<ChunkConfig>,
    /// Retrieval depth for configs without their own `k`.
    pub default_k: usize,
    /// Keyword share of the fused score in hybrid search.
    pub keyword_weight: f32,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            configs: default_configs(),
            default_k: DEFAULT_RETRIEVAL_K,
            keyword_weight: 0.6,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub oracle: OracleConfig,
    pub benchmark: BenchmarkSettings,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileSection>,
    embedding: Option<EmbeddingConfig>,
    oracle: Option<OracleConfig>,
    benchmark: Option<BenchmarkSettings>,
}

#[derive(Debug, Deserialize)]
struct LlmFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_API_KEY, LLM_MODEL, ...)
    /// 2. Config file (~/.config/chunk-bench/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Load from an explicit file, then apply environment overrides.
    pub fn load_with_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
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

        if let Ok(provider) = env::var("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }

        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        if let Ok(timeout) = env::var("ORACLE_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.oracle.timeout_secs = secs;
            }
        }

        if let Ok(retries) = env::var("ORACLE_MAX_RETRIES") {
            if let Ok(n) = retries.parse() {
                self.oracle.max_retries = n;
            }
        }

        Ok(())
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ChunkBenchError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML configuration document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| ChunkBenchError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(llm) = file_config.llm {
            if let Some(api_base) = llm.api_base {
                config.llm.api_base = api_base;
            }
            if let Some(api_key) = llm.api_key {
                config.llm.api_key = api_key;
            }
            if let Some(model) = llm.model {
                config.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                config.llm.temperature = temperature;
            }
        }

        if let Some(embedding) = file_config.embedding {
            config.embedding = embedding;
        }
        if let Some(oracle) = file_config.oracle {
            config.oracle = oracle;
        }
        if let Some(benchmark) = file_config.benchmark {
            config.benchmark = benchmark;
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "chunk-bench")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the benchmark and embedding settings.
    pub fn validate(&self) -> Result<()> {
        validate_configs(&self.benchmark.configs)?;

        if self.benchmark.default_k == 0 {
            return Err(ChunkBenchError::Config(
                "benchmark.default_k must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.benchmark.keyword_weight) {
            return Err(ChunkBenchError::Config(format!(
                "benchmark.keyword_weight must be within [0, 1], got {}",
                self.benchmark.keyword_weight
            )));
        }

        if self.embedding.batch_size == 0 || self.embedding.workers == 0 {
            return Err(ChunkBenchError::Config(
                "embedding.batch_size and embedding.workers must be greater than 0".to_string(),
            ));
        }

        if self.embedding.provider == EmbeddingBackend::Hashing && self.embedding.dims == 0 {
            return Err(ChunkBenchError::Config(
                "embedding.dims must be greater than 0".to_string(),
            ));
        }

        if self.embedding.provider == EmbeddingBackend::OpenAi {
            self.validate_llm()?;
        }

        Ok(())
    }

    /// Validate that LLM credentials are present (judge and openai embedder).
    pub fn validate_llm(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(ChunkBenchError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(ChunkBenchError::Config(
                "LLM API key is required. Set LLM_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.model.is_empty() {
            return Err(ChunkBenchError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        Ok(())
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
