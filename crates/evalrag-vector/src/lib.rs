//! EvalRAG Vector - Embeddings and vector index abstraction
//!
//! Provides embedding clients (OpenAI-compatible, Ollama) and a
//! namespace-partitioned similarity index over Qdrant, with an in-memory
//! implementation for local runs and tests.
//!
//! Index failures never reach the grading pipeline directly: callers go
//! through [`BestEffortIndex`], which logs and degrades them.

use async_trait::async_trait;
use evalrag_core::{EvalError, Namespace, RecordKind, SimilarityMatch, VectorRecord};
use thiserror::Error;

pub mod best_effort;
pub mod embedding;
pub mod lazy;
pub mod memory;
pub mod qdrant_store;

pub use best_effort::{degrade, BestEffortIndex};
pub use embedding::{create_embedding_client, EmbeddingClient, OllamaEmbedding, OpenAiEmbedding};
pub use lazy::LazyQdrantIndex;
pub use memory::{cosine_similarity, MemoryIndex};
pub use qdrant_store::QdrantIndex;

/// Errors reported by a vector index provider
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Vector index is not configured: {0}")]
    NotConfigured(String),

    #[error("Vector index connection failed: {0}")]
    Connection(String),

    #[error("Vector index request failed: {0}")]
    Request(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

impl From<IndexError> for EvalError {
    fn from(err: IndexError) -> Self {
        EvalError::IndexUnavailable(err.to_string())
    }
}

/// Trait for namespace-partitioned vector index operations
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records by identifier
    async fn upsert(&self, namespace: &Namespace, records: &[VectorRecord]) -> IndexResult<()>;

    /// Up to `top_k` records of `kind`, most similar first
    async fn query(
        &self,
        namespace: &Namespace,
        vector: &[f32],
        top_k: usize,
        kind: RecordKind,
    ) -> IndexResult<Vec<SimilarityMatch>>;

    /// Remove every record in the namespace
    async fn delete_namespace(&self, namespace: &Namespace) -> IndexResult<()>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
