
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const CONFIG_FILE_NAME: &str = "patchforge.toml";

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

/// Application configuration, loaded from `patchforge.toml` at the repository
/// root. Every section has defaults, so a missing file is not an error. The
/// loaded value is threaded explicitly through constructors; there is no
/// process-wide configuration singleton.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub limits: LimitsConfig,
}

/// Chat-completion collaborator (change planner and diff generator).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the config file.
    pub api_key_env: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-coder".to_string(),
            api_key_env: "PATCHFORGE_API_KEY".to_string(),
            temperature: 0.0,
        }
    }
}

/// Embedding collaborator (Ollama-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 32,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Index directory, relative to the repository root. Safe to delete for
    /// a full reindex.
    pub dir: String,
    pub max_chars_per_file: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: ".patchforge_index".to_string(),
            max_chars_per_file: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Total character budget for the snippet block handed to the planner.
    pub max_snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 12,
            max_snippet_chars: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Upper bound on how many target files are handed to the diff generator
    /// in one run.
    pub max_files_for_llm: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_files_for_llm: 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Invalid max_files_for_llm: {0} (must be at least 1)")]
    InvalidMaxFiles(usize),
    #[error("Invalid index directory: {0:?} (cannot be empty or absolute)")]
    InvalidIndexDir(String),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from `<repo_root>/patchforge.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.llm.validate()?;
        self.embedding.validate()?;

        if self.index.dir.trim().is_empty() || Path::new(&self.index.dir).is_absolute() {
            return Err(ConfigError::InvalidIndexDir(self.index.dir.clone()));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }
        if self.limits.max_files_for_llm == 0 {
            return Err(ConfigError::InvalidMaxFiles(self.limits.max_files_for_llm));
        }

        Ok(())
    }

    /// Absolute path of the index directory for a given repository.
    pub fn index_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.index.dir)
    }
}

impl LlmConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        Ok(())
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn endpoint_url(&self) -> std::result::Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

/// Render the effective configuration for `patchforge config`.
pub fn show_config(repo_root: &Path) -> Result<()> {
    let config = Config::load(repo_root)?;
    let rendered =
        toml::to_string_pretty(&config).context("Failed to serialize config to TOML")?;
    println!("# effective configuration ({})", CONFIG_FILE_NAME);
    print!("{rendered}");
    Ok(())
}
