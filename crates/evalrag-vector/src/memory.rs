//! In-process vector index
//!
//! Brute-force cosine search over records held in memory. Used for local
//! runs without a Qdrant server and throughout the test suite.

use std::collections::HashMap;

use async_trait::async_trait;
use evalrag_core::{Namespace, RecordKind, SimilarityMatch, VectorRecord};
use tokio::sync::RwLock;

use crate::{IndexError, IndexResult, VectorIndex};

/// Cosine similarity; zero for mismatched lengths or zero-magnitude vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

type Partition = HashMap<String, VectorRecord>;

/// Namespace-partitioned index kept in memory
#[derive(Debug, Default)]
pub struct MemoryIndex {
    partitions: RwLock<HashMap<Namespace, Partition>>,
    dimension: Option<usize>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the vector width for every namespace up front
    ///
    /// Without it, each namespace takes its width from the first record stored.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            partitions: RwLock::default(),
            dimension: Some(dimension),
        }
    }

    fn check_vector(&self, values: &[f32]) -> IndexResult<()> {
        if values.is_empty() {
            return Err(IndexError::InvalidVector("empty vector".to_string()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::InvalidVector("non-finite component".to_string()));
        }
        Ok(())
    }

    /// Width every vector of `partition` must have, if one is fixed yet
    fn expected_dimension(&self, partition: Option<&Partition>) -> Option<usize> {
        self.dimension.or_else(|| {
            partition
                .and_then(|p| p.values().next())
                .map(|record| record.values.len())
        })
    }

    /// Number of records stored in a namespace
    pub async fn len(&self, namespace: &Namespace) -> usize {
        self.partitions
            .read()
            .await
            .get(namespace)
            .map_or(0, |partition| partition.len())
    }

    pub async fn is_empty(&self, namespace: &Namespace) -> bool {
        self.len(namespace).await == 0
    }

    /// Fetch a record by id
    pub async fn get(&self, namespace: &Namespace, id: &str) -> Option<VectorRecord> {
        self.partitions
            .read()
            .await
            .get(namespace)
            .and_then(|partition| partition.get(id))
            .cloned()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, namespace: &Namespace, records: &[VectorRecord]) -> IndexResult<()> {
        for record in records {
            self.check_vector(&record.values)?;
        }

        let mut partitions = self.partitions.write().await;
        let expected = self
            .expected_dimension(partitions.get(namespace))
            .or_else(|| records.first().map(|record| record.values.len()));
        if let Some(expected) = expected {
            if let Some(record) = records.iter().find(|r| r.values.len() != expected) {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: record.values.len(),
                });
            }
        }

        let partition = partitions.entry(namespace.clone()).or_default();
        for record in records {
            partition.insert(record.id.clone(), record.clone());
        }

        Ok(())
    }

    async fn query(
        &self,
        namespace: &Namespace,
        vector: &[f32],
        top_k: usize,
        kind: RecordKind,
    ) -> IndexResult<Vec<SimilarityMatch>> {
        self.check_vector(vector)?;

        let partitions = self.partitions.read().await;
        if let Some(expected) = self.expected_dimension(partitions.get(namespace)) {
            if expected != vector.len() {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        let Some(partition) = partitions.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<SimilarityMatch> = partition
            .values()
            .filter(|record| record.metadata.kind == kind)
            .map(|record| SimilarityMatch {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.values),
                metadata: record.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> IndexResult<()> {
        self.partitions.write().await.remove(namespace);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
