//! EvalRAG RAG - Retrieval-augmented grading
//!
//! This crate implements the evaluation pipeline:
//! - Reference ingestion (extract, chunk, embed, index)
//! - Similarity checks between submissions (plagiarism)
//! - Reference context retrieval for grounding
//! - Grade synthesis by a completion model, clamped to the assignment's bounds
//! - Namespace purge on assignment deletion
//!
//! Author: hephaex@gmail.com

pub mod grading;
pub mod ingestion;
pub mod lifecycle;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod response;
pub mod similarity;

pub use grading::{
    GradingOrchestrator, GradingRequest, DEFAULT_FEEDBACK, FLAGGED_FEEDBACK,
    GRADING_FAILED_FEEDBACK, NO_REFERENCE_FEEDBACK,
};
pub use ingestion::{sanitize_snippet, ReferenceIngestor};
pub use lifecycle::{NamespaceLifecycle, RecordEvent, RecordEventBus, RecordEventHandler};
pub use llm::{create_llm_client, OllamaClient, OpenAiClient};
pub use pipeline::EvaluationPipeline;
pub use prompt::{format_reference_context, grading_messages, PromptBuilder};
pub use response::{clamp_grade, extract_json_object, parse_grading_response, ParsedGrade};
pub use similarity::{detect_plagiarism, SimilarityEngine};
