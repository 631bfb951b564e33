//! EvalRAG Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the EvalRAG system:
//! - Vector records and namespaces (one namespace per assignment)
//! - Similarity matches and grounding context
//! - Grading results and their terminal states
//! - Common error types
//! - The completion-model client trait
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, GradingConfig, IndexConfig, LlmConfig, LlmProvider,
    LoggingConfig, StorageConfig,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for EvalRAG operations
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EvalError>;

// ============================================================================
// Vector Records
// ============================================================================

/// Kind tag stored in every vector record's metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A chunk of faculty-supplied reference material
    Reference,
    /// A whole student submission
    Submission,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Submission => "submission",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reference" => Ok(Self::Reference),
            "submission" => Ok(Self::Submission),
            other => Err(EvalError::ValidationError(format!(
                "unknown record kind: {other}"
            ))),
        }
    }
}

/// Logical partition of the vector index, keyed by assignment identifier.
///
/// A namespace is never empty: an absent or blank assignment id has no
/// namespace, which turns every index operation on it into a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Derive the namespace owning all records of an assignment
    pub fn for_assignment(assignment_id: &str) -> Option<Self> {
        let trimmed = assignment_id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata stored alongside each vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Reference chunk or submission
    pub kind: RecordKind,

    /// Owning assignment
    pub assignment_id: String,

    /// Owning submission (submission records only)
    pub submission_id: Option<String>,

    /// Position in the reference document (reference records only)
    pub chunk_index: Option<u32>,

    /// Truncated, whitespace-collapsed text for audit display
    pub text_snippet: String,
}

/// A unit stored in the similarity index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier within the namespace
    pub id: String,

    /// Embedding vector
    pub values: Vec<f32>,

    /// Record metadata
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    /// Build the record for one chunk of reference material
    pub fn reference(
        assignment_id: &str,
        chunk_index: u32,
        values: Vec<f32>,
        text_snippet: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("reference-{assignment_id}-{chunk_index}"),
            values,
            metadata: RecordMetadata {
                kind: RecordKind::Reference,
                assignment_id: assignment_id.to_string(),
                submission_id: None,
                chunk_index: Some(chunk_index),
                text_snippet: text_snippet.into(),
            },
        }
    }

    /// Build the record for a student submission
    pub fn submission(
        assignment_id: &str,
        submission_id: &str,
        values: Vec<f32>,
        text_snippet: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("sub-{submission_id}"),
            values,
            metadata: RecordMetadata {
                kind: RecordKind::Submission,
                assignment_id: assignment_id.to_string(),
                submission_id: Some(submission_id.to_string()),
                chunk_index: None,
                text_snippet: text_snippet.into(),
            },
        }
    }
}

/// Result of a similarity query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    /// Record identifier
    pub id: String,

    /// Provider-reported similarity (higher is more similar)
    pub score: f32,

    /// Stored record metadata
    pub metadata: RecordMetadata,
}

/// Another submission found close to the one being graded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMatch {
    pub submission_id: Option<String>,
    pub score: f32,
    pub snippet: String,
}

impl From<SimilarityMatch> for SubmissionMatch {
    fn from(m: SimilarityMatch) -> Self {
        Self {
            submission_id: m.metadata.submission_id,
            score: m.score,
            snippet: m.metadata.text_snippet,
        }
    }
}

/// A reference excerpt used to ground grading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceChunk {
    pub score: f32,
    pub chunk_index: Option<u32>,
    pub text: String,
}

impl From<SimilarityMatch> for ReferenceChunk {
    fn from(m: SimilarityMatch) -> Self {
        Self {
            score: m.score,
            chunk_index: m.metadata.chunk_index,
            text: m.metadata.text_snippet,
        }
    }
}

// ============================================================================
// Assignment and Grading Models
// ============================================================================

/// Assignment attributes supplied by the record store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Assignment identifier (also the namespace key)
    pub id: String,

    /// Assignment title
    pub title: String,

    /// Upper bound for the grade
    pub max_marks: f64,
}

impl Assignment {
    /// Create a new assignment
    pub fn new(id: impl Into<String>, title: impl Into<String>, max_marks: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            max_marks,
        }
    }
}

/// Terminal state reached by the grading state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingStatus {
    /// Graded by the completion model
    Graded,
    /// Too similar to another submission; scored zero without a model call
    Flagged,
    /// No reference material ingested for the assignment
    Ungraded,
    /// The completion model could not be used; needs manual review
    GradingFailed,
}

/// Outcome of grading one submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingResult {
    /// Terminal state
    pub status: GradingStatus,

    /// Grade in `[0, max_marks]`, or `None` when ungradable
    pub grade: Option<f64>,

    /// Feedback for the student
    pub feedback: String,

    /// Reference excerpts used for grounding
    pub reference_chunks: Vec<ReferenceChunk>,

    /// Suspected source when flagged
    pub similarity: Option<SubmissionMatch>,

    /// Submission embedding, for the record store to persist
    pub embedding: Vec<f32>,
}

/// Outcome of ingesting reference material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    /// Number of chunks produced and indexed
    pub chunk_count: usize,

    /// When ingestion finished
    pub indexed_at: DateTime<Utc>,
}

impl IngestionReport {
    pub fn new(chunk_count: usize) -> Self {
        Self {
            chunk_count,
            indexed_at: Utc::now(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A chat-style message sent to a completion model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a chat conversation, returning the assistant's text
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_from_assignment() {
        assert_eq!(
            Namespace::for_assignment("64f1c0ffee").map(|n| n.to_string()),
            Some("64f1c0ffee".to_string())
        );
        assert!(Namespace::for_assignment("").is_none());
        assert!(Namespace::for_assignment("   ").is_none());
    }

    #[test]
    fn test_record_identifiers() {
        let reference = VectorRecord::reference("a1", 2, vec![0.1], "snippet");
        assert_eq!(reference.id, "reference-a1-2");
        assert_eq!(reference.metadata.kind, RecordKind::Reference);
        assert_eq!(reference.metadata.chunk_index, Some(2));

        let submission = VectorRecord::submission("a1", "s9", vec![0.1], "");
        assert_eq!(submission.id, "sub-s9");
        assert_eq!(submission.metadata.submission_id.as_deref(), Some("s9"));
        assert_eq!(submission.metadata.chunk_index, None);
    }

    #[test]
    fn test_record_kind_round_trip() {
        assert_eq!("reference".parse::<RecordKind>().unwrap(), RecordKind::Reference);
        assert_eq!(RecordKind::Submission.to_string(), "submission");
        assert!("other".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_match_conversions() {
        let m = SimilarityMatch {
            id: "sub-s1".to_string(),
            score: 0.93,
            metadata: RecordMetadata {
                kind: RecordKind::Submission,
                assignment_id: "a1".to_string(),
                submission_id: Some("s1".to_string()),
                chunk_index: None,
                text_snippet: "copied text".to_string(),
            },
        };

        let sub = SubmissionMatch::from(m.clone());
        assert_eq!(sub.submission_id.as_deref(), Some("s1"));
        assert_eq!(sub.snippet, "copied text");

        let chunk = ReferenceChunk::from(m);
        assert_eq!(chunk.chunk_index, None);
        assert!((chunk.score - 0.93).abs() < f32::EPSILON);
    }

    #[test]
    fn test_grading_status_serialization() {
        let json = serde_json::to_string(&GradingStatus::GradingFailed).unwrap();
        assert_eq!(json, "\"grading_failed\"");
    }

    #[test]
    fn test_chat_message_roles() {
        let msg = ChatMessage::system("be strict");
        assert_eq!(msg.role, ChatRole::System);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            serde_json::json!({"role": "system", "content": "be strict"})
        );
    }
}
