//! Qdrant implementation of the vector index
//!
//! Qdrant has no namespaces, so every point carries its namespace in the
//! payload and every query and delete filters on it. Point ids are derived
//! from `namespace/record_id`, which keeps re-upserts idempotent.
//!
//! Author: hephaex@gmail.com

use std::collections::HashMap;

use async_trait::async_trait;
use evalrag_core::{IndexConfig, Namespace, RecordKind, RecordMetadata, SimilarityMatch, VectorRecord};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{IndexError, IndexResult, VectorIndex};

/// Qdrant vector index
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantIndex {
    /// Create a new Qdrant connection
    pub fn new(config: &IndexConfig) -> IndexResult<Self> {
        let mut builder = Qdrant::from_url(&config.qdrant_url);
        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| IndexError::Connection(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension: config.vector_dimension,
        })
    }

    /// Create the collection if it does not exist yet
    pub async fn init_collection(&self) -> IndexResult<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| IndexError::Connection(format!("Failed to list collections: {e}")))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            tracing::info!(collection = %self.collection, dimension = self.dimension, "Creating collection");
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| IndexError::Request(format!("Failed to create collection: {e}")))?;
        }

        Ok(())
    }

    fn check_dimension(&self, values: &[f32]) -> IndexResult<()> {
        if values.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: values.len(),
            });
        }
        Ok(())
    }
}

/// Stable point id for a record inside a namespace
pub fn point_id(namespace: &Namespace, record_id: &str) -> String {
    let key = format!("{namespace}/{record_id}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Payload stored with each vector
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PointPayload {
    namespace: String,
    record_id: String,
    kind: String,
    assignment_id: String,
    submission_id: Option<String>,
    chunk_index: Option<u32>,
    text_snippet: String,
}

impl PointPayload {
    fn new(namespace: &Namespace, record: &VectorRecord) -> Self {
        Self {
            namespace: namespace.to_string(),
            record_id: record.id.clone(),
            kind: record.metadata.kind.as_str().to_string(),
            assignment_id: record.metadata.assignment_id.clone(),
            submission_id: record.metadata.submission_id.clone(),
            chunk_index: record.metadata.chunk_index,
            text_snippet: record.metadata.text_snippet.clone(),
        }
    }

    fn into_map(self) -> IndexResult<HashMap<String, qdrant_client::qdrant::Value>> {
        let value = serde_json::to_value(&self)
            .map_err(|e| IndexError::Request(format!("Failed to encode payload: {e}")))?;

        Ok(value
            .as_object()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k, v.into()))
            .collect())
    }
}

fn payload_str(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn namespace_filter(namespace: &Namespace) -> Condition {
    Condition::matches("namespace", namespace.to_string())
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, namespace: &Namespace, records: &[VectorRecord]) -> IndexResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(records.len());
        for record in records {
            self.check_dimension(&record.values)?;
            let payload = PointPayload::new(namespace, record).into_map()?;
            points.push(PointStruct::new(
                point_id(namespace, &record.id),
                record.values.clone(),
                payload,
            ));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| IndexError::Request(format!("Failed to upsert vectors: {e}")))?;

        tracing::debug!(namespace = %namespace, count = records.len(), "Vectors upserted");
        Ok(())
    }

    async fn query(
        &self,
        namespace: &Namespace,
        vector: &[f32],
        top_k: usize,
        kind: RecordKind,
    ) -> IndexResult<Vec<SimilarityMatch>> {
        self.check_dimension(vector)?;

        let filter = Filter::must([
            namespace_filter(namespace),
            Condition::matches("kind", kind.as_str().to_string()),
        ]);

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector.to_vec(), top_k as u64)
                    .filter(filter)
                    .with_payload(true),
            )
            .await
            .map_err(|e| IndexError::Request(format!("Vector search failed: {e}")))?;

        let matches = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let chunk_index = payload
                    .get("chunk_index")
                    .and_then(|v| v.as_integer())
                    .and_then(|i| u32::try_from(i).ok());

                SimilarityMatch {
                    id: payload_str(&payload, "record_id").unwrap_or_default(),
                    score: point.score,
                    metadata: RecordMetadata {
                        kind,
                        assignment_id: payload_str(&payload, "assignment_id").unwrap_or_default(),
                        submission_id: payload_str(&payload, "submission_id"),
                        chunk_index,
                        text_snippet: payload_str(&payload, "text_snippet").unwrap_or_default(),
                    },
                }
            })
            .collect();

        Ok(matches)
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> IndexResult<()> {
        let filter = Filter::must([namespace_filter(namespace)]);

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(filter)
                    .wait(true),
            )
            .await
            .map_err(|e| IndexError::Request(format!("Failed to delete namespace: {e}")))?;

        tracing::info!(namespace = %namespace, "Namespace deleted");
        Ok(())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
