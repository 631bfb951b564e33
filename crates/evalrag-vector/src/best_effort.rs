//! Non-fatal access to the vector index
//!
//! The index is an enrichment layer, not a system of record. Every call made
//! through [`BestEffortIndex`] resolves to a usable value: failed writes are
//! logged and reported as `false`, failed reads become an empty result, and
//! failed deletes are logged only.

use std::sync::Arc;

use evalrag_core::{Namespace, RecordKind, SimilarityMatch, VectorRecord};

use crate::{IndexResult, VectorIndex};

/// Resolve an index result, logging and substituting the default on failure
pub fn degrade<T: Default>(result: IndexResult<T>, operation: &str, namespace: &Namespace) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                operation = operation,
                namespace = %namespace,
                error = %e,
                "Vector index call failed, continuing without it"
            );
            T::default()
        }
    }
}

/// Assignment-scoped facade over a [`VectorIndex`]
#[derive(Clone)]
pub struct BestEffortIndex {
    inner: Arc<dyn VectorIndex>,
}

impl BestEffortIndex {
    pub fn new(inner: Arc<dyn VectorIndex>) -> Self {
        Self { inner }
    }

    /// Backend name for logging
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Insert or replace records; `true` only when the index confirmed the write
    pub async fn upsert(&self, assignment_id: &str, records: &[VectorRecord]) -> bool {
        let Some(namespace) = Namespace::for_assignment(assignment_id) else {
            tracing::debug!("Upsert skipped: no assignment namespace");
            return false;
        };
        if records.is_empty() {
            return false;
        }

        match self.inner.upsert(&namespace, records).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    namespace = %namespace,
                    count = records.len(),
                    backend = self.inner.name(),
                    error = %e,
                    "Vector upsert failed, records not indexed"
                );
                false
            }
        }
    }

    /// Most similar records of `kind`, highest score first; empty on any failure
    pub async fn query(
        &self,
        assignment_id: &str,
        vector: &[f32],
        top_k: usize,
        kind: RecordKind,
    ) -> Vec<SimilarityMatch> {
        let Some(namespace) = Namespace::for_assignment(assignment_id) else {
            return Vec::new();
        };
        if top_k == 0 || vector.is_empty() || vector.iter().any(|v| !v.is_finite()) {
            tracing::debug!(namespace = %namespace, "Query skipped: invalid query vector");
            return Vec::new();
        }

        let mut matches = degrade(
            self.inner.query(&namespace, vector, top_k, kind).await,
            "query",
            &namespace,
        );

        // Ordering and kind are enforced here regardless of backend
        matches.retain(|m| m.metadata.kind == kind);
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        matches
    }

    /// Remove every record of an assignment; failures are logged only
    pub async fn delete_namespace(&self, assignment_id: &str) {
        let Some(namespace) = Namespace::for_assignment(assignment_id) else {
            return;
        };

        degrade(
            self.inner.delete_namespace(&namespace).await,
            "delete_namespace",
            &namespace,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexError, MemoryIndex};
    use async_trait::async_trait;

    struct UnavailableIndex;

    #[async_trait]
    impl VectorIndex for UnavailableIndex {
        async fn upsert(&self, _: &Namespace, _: &[VectorRecord]) -> IndexResult<()> {
            Err(IndexError::Connection("connection refused".to_string()))
        }

        async fn query(
            &self,
            _: &Namespace,
            _: &[f32],
            _: usize,
            _: RecordKind,
        ) -> IndexResult<Vec<SimilarityMatch>> {
            Err(IndexError::Connection("connection refused".to_string()))
        }

        async fn delete_namespace(&self, _: &Namespace) -> IndexResult<()> {
            Err(IndexError::Request("timeout".to_string()))
        }

        fn name(&self) -> &str {
            "unavailable"
        }
    }

    #[tokio::test]
    async fn test_failures_degrade() {
        let index = BestEffortIndex::new(Arc::new(UnavailableIndex));
        let record = VectorRecord::submission("a1", "s1", vec![1.0], "text");

        assert!(!index.upsert("a1", &[record]).await);
        assert!(index
            .query("a1", &[1.0], 3, RecordKind::Submission)
            .await
            .is_empty());
        index.delete_namespace("a1").await;
    }

    #[tokio::test]
    async fn test_blank_assignment_is_noop() {
        let memory = Arc::new(MemoryIndex::new());
        let index = BestEffortIndex::new(memory.clone());
        let record = VectorRecord::submission("", "s1", vec![1.0], "text");

        assert!(!index.upsert("  ", &[record]).await);
        assert!(!index.upsert("a1", &[]).await);
        assert!(index.query("", &[1.0], 3, RecordKind::Submission).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_query_vector_is_empty() {
        let memory = Arc::new(MemoryIndex::new());
        let index = BestEffortIndex::new(memory);
        index
            .upsert("a1", &[VectorRecord::reference("a1", 0, vec![1.0, 0.0], "x")])
            .await;

        assert!(index.query("a1", &[], 5, RecordKind::Reference).await.is_empty());
        assert!(index
            .query("a1", &[f32::INFINITY, 0.0], 5, RecordKind::Reference)
            .await
            .is_empty());
        assert_eq!(
            index.query("a1", &[1.0, 0.0], 5, RecordKind::Reference).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_namespace_clears_assignment() {
        let memory = Arc::new(MemoryIndex::new());
        let index = BestEffortIndex::new(memory.clone());
        assert!(
            index
                .upsert("a1", &[VectorRecord::reference("a1", 0, vec![1.0], "x")])
                .await
        );

        index.delete_namespace("a1").await;
        let ns = Namespace::for_assignment("a1").unwrap();
        assert!(memory.is_empty(&ns).await);
    }
}
