//! Reference ingestion: extract, chunk, embed, index

use std::sync::Arc;

use evalrag_core::{EvalError, IngestionReport, Result, VectorRecord};
use evalrag_parser::{chunk_text, normalize_whitespace, ChunkConfig, TextExtraction};
use evalrag_vector::{BestEffortIndex, EmbeddingClient};

use crate::prompt::truncate_chars;

/// Collapse whitespace and bound the length of text kept for audit display
pub fn sanitize_snippet(text: &str, limit: usize) -> String {
    truncate_chars(&normalize_whitespace(text), limit).to_string()
}

/// Indexes faculty reference material for an assignment
pub struct ReferenceIngestor {
    extractor: Arc<dyn TextExtraction>,
    embedder: Arc<dyn EmbeddingClient>,
    index: BestEffortIndex,
    chunking: ChunkConfig,
    snippet_limit: usize,
}

impl ReferenceIngestor {
    pub fn new(
        extractor: Arc<dyn TextExtraction>,
        embedder: Arc<dyn EmbeddingClient>,
        index: BestEffortIndex,
        chunking: ChunkConfig,
    ) -> Self {
        Self {
            extractor,
            embedder,
            index,
            chunking,
            snippet_limit: 600,
        }
    }

    pub fn with_snippet_limit(mut self, limit: usize) -> Self {
        self.snippet_limit = limit;
        self
    }

    /// Ingest a reference document into the assignment's namespace.
    ///
    /// Returns a zero-chunk report when either argument is blank. Extraction
    /// and embedding failures propagate; an index failure is logged and the
    /// report still carries the chunk count.
    pub async fn ingest_reference(
        &self,
        assignment_id: &str,
        document: &str,
    ) -> Result<IngestionReport> {
        let assignment_id = assignment_id.trim();
        if assignment_id.is_empty() || document.trim().is_empty() {
            return Ok(IngestionReport::new(0));
        }

        self.chunking.validate()?;

        let text = self.extractor.extract_text(document).await?;
        if text.trim().is_empty() {
            return Err(EvalError::Ingestion(
                "Unable to extract text from reference document".to_string(),
            ));
        }

        let chunks = chunk_text(&text, &self.chunking)?;
        tracing::info!(
            assignment_id = %assignment_id,
            chunks = chunks.len(),
            "Reference document chunked"
        );

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let embedding = self.embedder.embed(&chunk.content).await?;
            records.push(VectorRecord::reference(
                assignment_id,
                chunk.index,
                embedding,
                sanitize_snippet(&chunk.content, self.snippet_limit),
            ));
        }

        if !self.index.upsert(assignment_id, &records).await {
            tracing::warn!(
                assignment_id = %assignment_id,
                "Reference chunks were not indexed; grading will find no context until re-ingested"
            );
        }

        Ok(IngestionReport::new(chunks.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_snippet() {
        assert_eq!(sanitize_snippet("  a\n\n b\tc  ", 600), "a b c");
        assert_eq!(sanitize_snippet("abcdef", 4), "abcd");
        assert_eq!(sanitize_snippet(&"é ".repeat(400), 600).chars().count(), 600);
    }
}
