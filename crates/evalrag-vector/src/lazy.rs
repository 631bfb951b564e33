//! Qdrant index that connects on first use
//!
//! Construction never touches the network. The first call builds the client
//! and ensures the collection exists; every later call reuses that client.
//! A failed initialization is not cached, so the next call retries it.

use async_trait::async_trait;
use evalrag_core::{IndexConfig, Namespace, RecordKind, SimilarityMatch, VectorRecord};
use tokio::sync::OnceCell;

use crate::{IndexResult, QdrantIndex, VectorIndex};

/// Shared, lazily connected Qdrant index
pub struct LazyQdrantIndex {
    config: IndexConfig,
    index: OnceCell<QdrantIndex>,
}

impl LazyQdrantIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            index: OnceCell::new(),
        }
    }

    /// Whether the connection has been established
    pub fn is_connected(&self) -> bool {
        self.index.initialized()
    }

    async fn get(&self) -> IndexResult<&QdrantIndex> {
        self.index
            .get_or_try_init(|| async {
                let index = QdrantIndex::new(&self.config)?;
                index.init_collection().await?;
                tracing::info!(
                    url = %self.config.qdrant_url,
                    collection = %self.config.collection,
                    "Vector index connected"
                );
                Ok(index)
            })
            .await
    }
}

#[async_trait]
impl VectorIndex for LazyQdrantIndex {
    async fn upsert(&self, namespace: &Namespace, records: &[VectorRecord]) -> IndexResult<()> {
        self.get().await?.upsert(namespace, records).await
    }

    async fn query(
        &self,
        namespace: &Namespace,
        vector: &[f32],
        top_k: usize,
        kind: RecordKind,
    ) -> IndexResult<Vec<SimilarityMatch>> {
        self.get().await?.query(namespace, vector, top_k, kind).await
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> IndexResult<()> {
        self.get().await?.delete_namespace(namespace).await
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexError;

    #[tokio::test]
    async fn test_unreachable_server_is_not_cached() {
        let config = IndexConfig {
            qdrant_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let index = LazyQdrantIndex::new(config);
        assert!(!index.is_connected());

        let ns = Namespace::for_assignment("a1").unwrap();
        let err = index.delete_namespace(&ns).await.unwrap_err();
        assert!(matches!(err, IndexError::Connection(_)));
        assert!(!index.is_connected());
    }
}
