//! Embedding client for generating vector representations
//!
//! Supports OpenAI-compatible and Ollama embedding APIs. A provider failure
//! or an empty vector is always an `EvalError::Embedding`; no caller ever
//! receives a placeholder vector.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use evalrag_core::{EmbeddingConfig, EvalError, LlmProvider, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

fn ensure_non_empty(embedding: Vec<f32>) -> Result<Vec<f32>> {
    if embedding.is_empty() {
        return Err(EvalError::Embedding(
            "Provider returned an empty embedding".to_string(),
        ));
    }
    Ok(embedding)
}

fn model_name(config: &EmbeddingConfig) -> Result<&str> {
    config.model_name().ok_or_else(|| {
        EvalError::Configuration(format!(
            "Provider {:?} does not serve embeddings",
            config.provider
        ))
    })
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EvalError::Configuration(format!("Failed to build HTTP client: {e}")))
}

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI-compatible embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536, // Default
        };

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let model = model_name(config)?;
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| EvalError::Configuration("Embedding API key required".to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .or_else(|| config.provider.default_base_url().map(str::to_string))
            .ok_or_else(|| {
                EvalError::Configuration(format!(
                    "Embedding base URL required for provider {:?}",
                    config.provider
                ))
            })?;

        let mut client = Self::new(api_key.clone(), model).with_base_url(base_url);
        client.client = http_client(config.timeout_secs)?;
        Ok(client)
    }

    /// Set custom base URL (for Azure or compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        let embedding = results
            .into_iter()
            .next()
            .ok_or_else(|| EvalError::Embedding("No embedding returned".to_string()))?;
        ensure_non_empty(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OpenAiEmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EvalError::Embedding(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EvalError::Embedding(format!(
                "Embedding provider error ({status}): {error_text}"
            )));
        }

        let result: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EvalError::Embedding(format!("Failed to parse embedding response: {e}")))?;

        if result.data.len() != texts.len() {
            return Err(EvalError::Embedding(format!(
                "Expected {} embeddings, provider returned {}",
                texts.len(),
                result.data.len()
            )));
        }

        // Sort by index and extract embeddings
        let mut embeddings: Vec<_> = result.data.into_iter().collect();
        embeddings.sort_by_key(|e| e.index);

        embeddings
            .into_iter()
            .map(|e| ensure_non_empty(e.embedding))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768, // Default for most models
        };

        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let mut client = Self::new(config.ollama_url.clone(), model_name(config)?);
        client.client = http_client(config.timeout_secs)?;
        Ok(client)
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| EvalError::Embedding(format!("Ollama embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EvalError::Embedding(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EvalError::Embedding(format!("Failed to parse embedding response: {e}")))?;

        ensure_non_empty(result.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama doesn't have native batch embedding, so we process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        LlmProvider::OpenAI | LlmProvider::Azure => {
            Ok(Box::new(OpenAiEmbedding::from_config(config)?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(config)?)),
        LlmProvider::Groq => Err(EvalError::Configuration(
            "Groq does not serve embeddings; use OpenAI, Azure or Ollama".to_string(),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
