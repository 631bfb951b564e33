//! EvalRAG Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Vector index connection
    pub index: IndexConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Completion model configuration
    pub llm: LlmConfig,

    /// Grading and ingestion policy
    pub grading: GradingConfig,

    /// Document storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Qdrant
        if let Ok(url) = std::env::var("QDRANT_URL") {
            self.index.qdrant_url = url;
        }
        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            self.index.api_key = Some(key);
        }
        if let Ok(collection) = std::env::var("QDRANT_COLLECTION") {
            self.index.collection = collection;
        }
        if let Ok(dim) = std::env::var("VECTOR_DIMENSION") {
            self.index.vector_dimension = parse_var("VECTOR_DIMENSION", dim)?;
        }

        // Embeddings
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(key) = first_var(&["EMBEDDING_API_KEY", "OPENAI_API_KEY"]) {
            self.embedding.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.embedding.model = Some(model);
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(key) = first_var(&["LLM_API_KEY", "GROQ_API_KEY"]) {
            self.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.llm.ollama_url = url.clone();
            self.embedding.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }

        // Grading policy
        if let Ok(threshold) = std::env::var("PLAGIARISM_THRESHOLD") {
            self.grading.plagiarism_threshold = parse_var("PLAGIARISM_THRESHOLD", threshold)?;
        }

        // Storage
        if let Ok(url) = std::env::var("STORAGE_BASE_URL") {
            self.storage.fallback_base_url = Some(url);
        }
        if let Ok(dir) = std::env::var("EVALRAG_TEMP_DIR") {
            self.storage.temp_dir = Some(PathBuf::from(dir));
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Reject settings that would make the pipeline misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grading.validate()?;

        if self.embedding.model_name().is_none() {
            return Err(ConfigError::InvalidValue {
                key: "embedding.provider".to_string(),
                value: format!("{:?} does not serve embeddings", self.embedding.provider),
            });
        }

        if self.index.vector_dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "index.vector_dimension".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| std::env::var(key).ok())
        .filter(|value| !value.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Vector index (Qdrant) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Qdrant gRPC URL
    pub qdrant_url: String,

    /// Qdrant API key (cloud deployments)
    pub api_key: Option<String>,

    /// Collection holding every namespace
    pub collection: String,

    /// Vector dimension (must match embedding model)
    pub vector_dimension: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "evalrag_vectors".to_string(),
            vector_dimension: 1536, // OpenAI text-embedding-3-small
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider serving the embedding model
    pub provider: LlmProvider,

    /// Bearer credential
    pub api_key: Option<String>,

    /// API base URL (for Azure or compatible APIs)
    pub base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Embedding model name (provider default when unset)
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    /// Configured model, or the provider's default
    ///
    /// `None` for providers without an embeddings endpoint.
    pub fn model_name(&self) -> Option<&str> {
        match (&self.model, self.provider) {
            (_, LlmProvider::Groq) => None,
            (Some(model), _) => Some(model.as_str()),
            (None, LlmProvider::OpenAI | LlmProvider::Azure) => Some("text-embedding-3-small"),
            (None, LlmProvider::Ollama) => Some("nomic-embed-text"),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: None,
            base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: None,
            timeout_secs: 30,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// Bearer credential
    pub api_key: Option<String>,

    /// API base URL override
    pub base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq,
            api_key: None,
            base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            max_tokens: 800,
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
    Azure,
    Groq,
}

impl LlmProvider {
    /// Default base URL for OpenAI-compatible providers
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("https://api.openai.com/v1"),
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::Ollama | Self::Azure => None,
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "azure" => Ok(Self::Azure),
            "groq" => Ok(Self::Groq),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Grading and ingestion policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    /// Similarity above which another submission counts as copied
    pub plagiarism_threshold: f32,

    /// Number of neighbouring submissions inspected for plagiarism
    pub similar_submissions_top_k: usize,

    /// Number of reference chunks retrieved for grounding
    pub reference_top_k: usize,

    /// Submission text sent to the model (characters)
    pub submission_char_budget: usize,

    /// Stored snippet length (characters)
    pub snippet_char_limit: usize,

    /// Chunk size for reference documents (characters)
    pub chunk_size: usize,

    /// Chunk overlap (characters)
    pub chunk_overlap: usize,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            plagiarism_threshold: 0.9,
            similar_submissions_top_k: 3,
            reference_top_k: 5,
            submission_char_budget: 6000,
            snippet_char_limit: 600,
            chunk_size: 1200,
            chunk_overlap: 200,
        }
    }
}

impl GradingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "grading.chunk_overlap".to_string(),
                value: format!(
                    "{} (chunk_size {})",
                    self.chunk_overlap, self.chunk_size
                ),
            });
        }

        for (key, value) in [
            ("grading.similar_submissions_top_k", self.similar_submissions_top_k),
            ("grading.reference_top_k", self.reference_top_k),
            ("grading.submission_char_budget", self.submission_char_budget),
            ("grading.snippet_char_limit", self.snippet_char_limit),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        if !(0.0..=1.0).contains(&self.plagiarism_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "grading.plagiarism_threshold".to_string(),
                value: self.plagiarism_threshold.to_string(),
            });
        }

        Ok(())
    }
}

/// Document storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Base URL used to recover documents whose local path no longer exists
    pub fallback_base_url: Option<String>,

    /// Directory for downloaded documents (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for crate::EvalError {
    fn from(err: ConfigError) -> Self {
        crate::EvalError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.index.vector_dimension, 1536);
        assert_eq!(config.grading.chunk_size, 1200);
        assert_eq!(config.grading.chunk_overlap, 200);
        assert!((config.grading.plagiarism_threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.llm.max_tokens, 800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAI
        );
        assert_eq!("GROQ".parse::<LlmProvider>().unwrap(), LlmProvider::Groq);
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let grading = GradingConfig {
            chunk_size: 200,
            chunk_overlap: 200,
            ..Default::default()
        };
        assert!(matches!(
            grading.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let grading = GradingConfig {
            plagiarism_threshold: 1.5,
            ..Default::default()
        };
        assert!(grading.validate().is_err());
    }

    #[test]
    fn test_zero_retrieval_settings_rejected() {
        for grading in [
            GradingConfig {
                similar_submissions_top_k: 0,
                ..Default::default()
            },
            GradingConfig {
                reference_top_k: 0,
                ..Default::default()
            },
            GradingConfig {
                submission_char_budget: 0,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                grading.validate(),
                Err(ConfigError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_embedding_model_per_provider() {
        let openai = EmbeddingConfig::default();
        assert_eq!(openai.model_name(), Some("text-embedding-3-small"));

        let ollama = EmbeddingConfig {
            provider: LlmProvider::Ollama,
            ..Default::default()
        };
        assert_eq!(ollama.model_name(), Some("nomic-embed-text"));

        let custom = EmbeddingConfig {
            provider: LlmProvider::Ollama,
            model: Some("mxbai-embed-large".to_string()),
            ..Default::default()
        };
        assert_eq!(custom.model_name(), Some("mxbai-embed-large"));
    }

    #[test]
    fn test_groq_embeddings_rejected() {
        let mut config = AppConfig::default();
        config.embedding.provider = LlmProvider::Groq;
        assert!(config.embedding.model_name().is_none());

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "embedding.provider"));
    }

    #[test]
    fn test_partial_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[grading]\nplagiarism_threshold = 0.85\n\n[index]\ncollection = \"course_vectors\""
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert!((config.grading.plagiarism_threshold - 0.85).abs() < f32::EPSILON);
        assert_eq!(config.grading.reference_top_k, 5);
        assert_eq!(config.index.collection, "course_vectors");
        assert_eq!(config.index.qdrant_url, "http://localhost:6334");
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/evalrag.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
