//! End-to-end evaluation pipeline
//!
//! Wires extraction, embeddings, the vector index and the completion model
//! together behind the operations the record store calls.

use std::sync::Arc;

use evalrag_core::{AppConfig, Assignment, EvalError, GradingConfig, GradingResult, IngestionReport, LlmClient, Result};
use evalrag_parser::{ChunkConfig, TextExtraction, TextExtractor};
use evalrag_vector::{create_embedding_client, BestEffortIndex, EmbeddingClient, LazyQdrantIndex, VectorIndex};

use crate::grading::{GradingOrchestrator, GradingRequest};
use crate::ingestion::ReferenceIngestor;
use crate::lifecycle::NamespaceLifecycle;
use crate::llm::create_llm_client;
use crate::similarity::SimilarityEngine;

/// The assembled grading system
pub struct EvaluationPipeline {
    extractor: Arc<dyn TextExtraction>,
    ingestor: ReferenceIngestor,
    similarity: SimilarityEngine,
    orchestrator: GradingOrchestrator,
    lifecycle: NamespaceLifecycle,
}

impl EvaluationPipeline {
    /// Assemble from explicit components
    pub fn new(
        extractor: Arc<dyn TextExtraction>,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LlmClient>,
        index: Arc<dyn VectorIndex>,
        settings: GradingConfig,
    ) -> Result<Self> {
        settings.validate()?;
        let chunking = ChunkConfig::new(settings.chunk_size, settings.chunk_overlap)?;
        let index = BestEffortIndex::new(index);
        let similarity =
            SimilarityEngine::new(index.clone()).with_snippet_limit(settings.snippet_char_limit);

        Ok(Self {
            ingestor: ReferenceIngestor::new(
                Arc::clone(&extractor),
                Arc::clone(&embedder),
                index.clone(),
                chunking,
            )
            .with_snippet_limit(settings.snippet_char_limit),
            orchestrator: GradingOrchestrator::new(embedder, llm, similarity.clone(), settings),
            lifecycle: NamespaceLifecycle::new(index),
            similarity,
            extractor,
        })
    }

    /// Build every component from configuration.
    ///
    /// The Qdrant index connects on first use, so this never touches the network.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let extractor: Arc<dyn TextExtraction> = Arc::new(TextExtractor::from_config(&config.storage));
        let embedder: Arc<dyn EmbeddingClient> = Arc::from(create_embedding_client(&config.embedding)?);
        if embedder.dimension() != config.index.vector_dimension {
            return Err(EvalError::Configuration(format!(
                "Embedding model {} produces {}-dimensional vectors but index.vector_dimension is {}",
                config.embedding.model_name().unwrap_or_default(),
                embedder.dimension(),
                config.index.vector_dimension
            )));
        }
        let llm: Arc<dyn LlmClient> = Arc::from(create_llm_client(&config.llm)?);
        let index: Arc<dyn VectorIndex> = Arc::new(LazyQdrantIndex::new(config.index.clone()));

        tracing::info!(
            embedding_provider = ?config.embedding.provider,
            llm_provider = ?config.llm.provider,
            collection = %config.index.collection,
            "Evaluation pipeline configured"
        );

        Self::new(extractor, embedder, llm, index, config.grading.clone())
    }

    pub fn similarity(&self) -> &SimilarityEngine {
        &self.similarity
    }

    pub fn lifecycle(&self) -> &NamespaceLifecycle {
        &self.lifecycle
    }

    /// Extract a document to plain text
    pub async fn extract_text(&self, document: &str) -> Result<String> {
        self.extractor.extract_text(document).await
    }

    /// Index reference material for an assignment
    pub async fn ingest_reference(&self, assignment_id: &str, document: &str) -> Result<IngestionReport> {
        self.ingestor.ingest_reference(assignment_id, document).await
    }

    /// Grade already-extracted submission text
    pub async fn grade_with_reference(&self, request: GradingRequest<'_>) -> Result<GradingResult> {
        self.orchestrator.grade_with_reference(request).await
    }

    /// Extract, grade and register a submission.
    ///
    /// The submission's embedding is recorded whatever the grading outcome,
    /// so later submissions are compared against it.
    pub async fn evaluate_submission(
        &self,
        assignment: &Assignment,
        submission_id: &str,
        document: &str,
    ) -> Result<GradingResult> {
        let text = self.extractor.extract_text(document).await?;
        if text.trim().is_empty() {
            return Err(EvalError::Extraction(format!(
                "No text could be extracted from submission {submission_id}"
            )));
        }

        let request = GradingRequest::new(assignment, &text).with_submission_id(submission_id);
        let result = self.orchestrator.grade_with_reference(request).await?;

        self.similarity
            .record_submission(&assignment.id, submission_id, &result.embedding, &text)
            .await;

        tracing::info!(
            assignment_id = %assignment.id,
            submission_id = %submission_id,
            status = ?result.status,
            grade = ?result.grade,
            "Submission evaluated"
        );

        Ok(result)
    }

    /// Remove every vector of a deleted assignment
    pub async fn purge(&self, assignment_id: &str) {
        self.lifecycle.purge(assignment_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalrag_core::{EmbeddingConfig, LlmConfig, LlmProvider};

    fn local_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.embedding = EmbeddingConfig {
            provider: LlmProvider::Ollama,
            ..Default::default()
        };
        config.llm = LlmConfig {
            provider: LlmProvider::Ollama,
            ..Default::default()
        };
        config.index.vector_dimension = 768;
        config
    }

    #[test]
    fn test_from_config_rejects_dimension_mismatch() {
        let mut config = local_config();
        config.index.vector_dimension = 1536;

        let err = EvaluationPipeline::from_config(&config).err().unwrap();
        assert!(
            matches!(&err, EvalError::Configuration(msg) if msg.contains("768") && msg.contains("1536")),
            "unexpected error: {err}"
        );

        config.index.vector_dimension = 768;
        assert!(EvaluationPipeline::from_config(&config).is_ok());
    }

    #[test]
    fn test_from_config_rejects_bad_chunking() {
        let mut config = local_config();
        assert!(EvaluationPipeline::from_config(&config).is_ok());

        config.grading.chunk_overlap = config.grading.chunk_size;
        assert!(matches!(
            EvaluationPipeline::from_config(&config),
            Err(EvalError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = local_config();
        config.grading.similar_submissions_top_k = 0;
        assert!(matches!(
            EvaluationPipeline::from_config(&config),
            Err(EvalError::Configuration(msg)) if msg.contains("similar_submissions_top_k")
        ));
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = AppConfig::default();
        assert!(matches!(
            EvaluationPipeline::from_config(&config),
            Err(EvalError::Configuration(_))
        ));
    }
}
