//! Similarity lookups against an assignment's namespace
//!
//! Both read paths inherit the index's degradation policy: when the index is
//! unavailable they report no evidence instead of failing.

use evalrag_core::{RecordKind, ReferenceChunk, SubmissionMatch, VectorRecord};
use evalrag_vector::BestEffortIndex;

use crate::ingestion::sanitize_snippet;

/// First match that is not the submission itself and scores above `threshold`
pub fn detect_plagiarism<'a>(
    matches: &'a [SubmissionMatch],
    own_submission_id: Option<&str>,
    threshold: f32,
) -> Option<&'a SubmissionMatch> {
    matches.iter().find(|m| {
        let is_self = match (m.submission_id.as_deref(), own_submission_id) {
            (Some(other), Some(own)) => other == own,
            _ => false,
        };
        !is_self && m.score > threshold
    })
}

/// Namespace-scoped similarity queries
#[derive(Clone)]
pub struct SimilarityEngine {
    index: BestEffortIndex,
    snippet_limit: usize,
}

impl SimilarityEngine {
    pub fn new(index: BestEffortIndex) -> Self {
        Self {
            index,
            snippet_limit: 600,
        }
    }

    pub fn with_snippet_limit(mut self, limit: usize) -> Self {
        self.snippet_limit = limit;
        self
    }

    /// Other submissions closest to `embedding`, highest score first
    pub async fn find_similar_submissions(
        &self,
        assignment_id: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Vec<SubmissionMatch> {
        self.index
            .query(assignment_id, embedding, top_k, RecordKind::Submission)
            .await
            .into_iter()
            .map(SubmissionMatch::from)
            .collect()
    }

    /// Reference excerpts closest to `embedding`, highest score first
    pub async fn fetch_reference_context(
        &self,
        assignment_id: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Vec<ReferenceChunk> {
        self.index
            .query(assignment_id, embedding, top_k, RecordKind::Reference)
            .await
            .into_iter()
            .map(ReferenceChunk::from)
            .collect()
    }

    /// Register a submission's embedding so later submissions are compared against it.
    ///
    /// Returns whether the record was indexed.
    pub async fn record_submission(
        &self,
        assignment_id: &str,
        submission_id: &str,
        embedding: &[f32],
        snippet: &str,
    ) -> bool {
        if assignment_id.trim().is_empty() || submission_id.trim().is_empty() || embedding.is_empty()
        {
            return false;
        }

        let record = VectorRecord::submission(
            assignment_id.trim(),
            submission_id.trim(),
            embedding.to_vec(),
            sanitize_snippet(snippet, self.snippet_limit),
        );

        let indexed = self.index.upsert(assignment_id, &[record]).await;
        if indexed {
            tracing::debug!(
                assignment_id = %assignment_id,
                submission_id = %submission_id,
                "Submission embedding recorded"
            );
        }
        indexed
    }
}
