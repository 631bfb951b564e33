//! Grading orchestrator
//!
//! Grades one submission through a fixed sequence of stages:
//!
//! 1. embed the submission text unless an embedding was supplied
//! 2. compare against other submissions; a suspect ends in [`GradingStatus::Flagged`]
//! 3. retrieve reference context; none ends in [`GradingStatus::Ungraded`]
//! 4. ask the completion model for a grade grounded in that context
//! 5. parse and clamp the reply into [`GradingStatus::Graded`]
//!
//! A completion failure or an undecodable reply in stages 4-5 ends in
//! [`GradingStatus::GradingFailed`]. Only an embedding failure is an error.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;

use evalrag_core::{
    Assignment, EvalError, GradingConfig, GradingResult, GradingStatus, LlmClient,
    ReferenceChunk, Result, SubmissionMatch,
};
use evalrag_vector::EmbeddingClient;

use crate::prompt::grading_messages;
use crate::response::{clamp_grade, parse_grading_response};
use crate::similarity::{detect_plagiarism, SimilarityEngine};

pub const FLAGGED_FEEDBACK: &str = "Submission flagged as copied based on similarity analysis.";
pub const NO_REFERENCE_FEEDBACK: &str = "No reference material available to grade this submission.";
pub const GRADING_FAILED_FEEDBACK: &str = "Automatic grading failed. Please review manually.";
pub const DEFAULT_FEEDBACK: &str = "Evaluation completed.";

/// One submission to grade
#[derive(Debug, Clone)]
pub struct GradingRequest<'a> {
    pub assignment: &'a Assignment,
    /// Excluded from its own plagiarism check
    pub submission_id: Option<&'a str>,
    pub submission_text: &'a str,
    /// Reused instead of embedding the text again
    pub embedding: Option<Vec<f32>>,
}

impl<'a> GradingRequest<'a> {
    pub fn new(assignment: &'a Assignment, submission_text: &'a str) -> Self {
        Self {
            assignment,
            submission_id: None,
            submission_text,
            embedding: None,
        }
    }

    pub fn with_submission_id(mut self, submission_id: &'a str) -> Self {
        self.submission_id = Some(submission_id);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Composes similarity checks, reference context and the completion model
pub struct GradingOrchestrator {
    embedder: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn LlmClient>,
    similarity: SimilarityEngine,
    settings: GradingConfig,
}

impl GradingOrchestrator {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LlmClient>,
        similarity: SimilarityEngine,
        settings: GradingConfig,
    ) -> Self {
        Self {
            embedder,
            llm,
            similarity,
            settings,
        }
    }

    /// Grade a submission against the assignment's reference material
    pub async fn grade_with_reference(&self, request: GradingRequest<'_>) -> Result<GradingResult> {
        let assignment = request.assignment;
        if !assignment.max_marks.is_finite() || assignment.max_marks < 0.0 {
            return Err(EvalError::ValidationError(format!(
                "Invalid maximum marks for assignment {}: {}",
                assignment.id, assignment.max_marks
            )));
        }

        let embedding = match request.embedding {
            Some(embedding) if !embedding.is_empty() => embedding,
            _ => self.embedder.embed(request.submission_text).await?,
        };

        let similar = self
            .similarity
            .find_similar_submissions(
                &assignment.id,
                &embedding,
                self.settings.similar_submissions_top_k,
            )
            .await;

        if let Some(suspect) = detect_plagiarism(
            &similar,
            request.submission_id,
            self.settings.plagiarism_threshold,
        ) {
            tracing::warn!(
                assignment_id = %assignment.id,
                submission_id = ?request.submission_id,
                suspect = ?suspect.submission_id,
                score = suspect.score,
                "Submission flagged as copied"
            );
            return Ok(flagged(suspect.clone(), embedding));
        }

        let reference_chunks = self
            .similarity
            .fetch_reference_context(&assignment.id, &embedding, self.settings.reference_top_k)
            .await;

        if reference_chunks.is_empty() {
            tracing::info!(assignment_id = %assignment.id, "No reference context, submission left ungraded");
            return Ok(GradingResult {
                status: GradingStatus::Ungraded,
                grade: None,
                feedback: NO_REFERENCE_FEEDBACK.to_string(),
                reference_chunks: Vec::new(),
                similarity: None,
                embedding,
            });
        }

        let messages = grading_messages(
            assignment,
            &reference_chunks,
            request.submission_text,
            self.settings.submission_char_budget,
        );

        let reply = match self.llm.chat(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(assignment_id = %assignment.id, error = %e, "Completion model call failed");
                return Ok(grading_failed(reference_chunks, embedding));
            }
        };

        let parsed = match parse_grading_response(&reply) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(assignment_id = %assignment.id, error = %e, "Grading reply rejected");
                return Ok(grading_failed(reference_chunks, embedding));
            }
        };

        let grade = parsed
            .grade
            .and_then(|raw| clamp_grade(raw, assignment.max_marks));

        tracing::info!(
            assignment_id = %assignment.id,
            grade = ?grade,
            reported = ?parsed.grade,
            context_chunks = reference_chunks.len(),
            "Submission graded"
        );

        Ok(GradingResult {
            status: GradingStatus::Graded,
            grade,
            feedback: parsed.feedback.unwrap_or_else(|| DEFAULT_FEEDBACK.to_string()),
            reference_chunks,
            similarity: None,
            embedding,
        })
    }
}

fn flagged(suspect: SubmissionMatch, embedding: Vec<f32>) -> GradingResult {
    GradingResult {
        status: GradingStatus::Flagged,
        grade: Some(0.0),
        feedback: FLAGGED_FEEDBACK.to_string(),
        reference_chunks: Vec::new(),
        similarity: Some(suspect),
        embedding,
    }
}

fn grading_failed(reference_chunks: Vec<ReferenceChunk>, embedding: Vec<f32>) -> GradingResult {
    GradingResult {
        status: GradingStatus::GradingFailed,
        grade: None,
        feedback: GRADING_FAILED_FEEDBACK.to_string(),
        reference_chunks,
        similarity: None,
        embedding,
    }
}
