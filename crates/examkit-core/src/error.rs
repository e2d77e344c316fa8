//! Domain error types.
//!
//! `StoreError` is defined here so the session runtime can downcast and
//! classify collaborator failures (swallow transient answer-save errors,
//! surface blocking start/submit errors) without string matching.

use thiserror::Error;

/// Errors returned by the scoring engine.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// The exam carries no questions: either a summary was passed where a
    /// fully-loaded exam was required, or the fetch was incomplete. Scoring
    /// refuses to run rather than silently produce an empty result.
    #[error("exam '{0}' has no questions loaded; refusing to score")]
    QuestionsNotLoaded(String),

    /// A response references a question identifier not present in the exam.
    #[error("response for unknown question '{0}'")]
    UnknownQuestion(String),

    /// An auto-gradable question has no answer key.
    #[error("question '{0}' is auto-gradable but has no answer key")]
    MissingAnswerKey(String),
}

/// A structural invariant violation in an exam definition, caught by
/// `parser::validate_exam` before the exam can reach scoring or a session.
#[derive(Debug, Error)]
#[error("invalid exam '{exam_id}': {message}")]
pub struct InvalidExam {
    pub exam_id: String,
    pub message: String,
}

impl InvalidExam {
    pub fn new(exam_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exam_id: exam_id.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by grading reconciliation.
#[derive(Debug, Error)]
pub enum GradingError {
    /// A manual mark was supplied for a question not in the exam.
    #[error("manual mark for unknown question '{0}'")]
    UnknownQuestion(String),

    /// A manual mark falls outside `[0, question.points]`. Rejected, never
    /// silently clamped.
    #[error("manual mark {given} for question '{question_id}' is outside 0..={max}")]
    MarkOutOfRange {
        question_id: String,
        given: f64,
        max: f64,
    },

    /// Scoring the auto-graded portion failed.
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// Errors that can occur when calling an external collaborator (the
/// persistence backend behind the trait seams).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The bearer token was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The exam or attempt does not exist on the backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request violated a backend rule (e.g. answering a closed attempt).
    #[error("rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend returned a server error.
    #[error("backend error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl StoreError {
    /// Returns `true` if this failure is transient: safe to swallow for
    /// fire-and-forget writes (answer saves, activity reports) because the
    /// local response state stays authoritative.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_) | StoreError::NetworkError(_) | StoreError::ApiError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StoreError::NetworkError("connection reset".into()).is_transient());
        assert!(StoreError::Timeout(30).is_transient());
        assert!(StoreError::ApiError { status: 503, message: "unavailable".into() }.is_transient());
        assert!(!StoreError::Unauthorized("bad token".into()).is_transient());
        assert!(!StoreError::NotFound("attempt".into()).is_transient());
        assert!(
            !StoreError::Rejected { status: 409, message: "attempt closed".into() }.is_transient()
        );
    }

    #[test]
    fn mark_out_of_range_message_names_the_question() {
        let err = GradingError::MarkOutOfRange {
            question_id: "q7".into(),
            given: 12.0,
            max: 10.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("q7"));
        assert!(msg.contains("12"));
    }
}
