//! Shared error types for the services crate.

use thiserror::Error;

use practice_core::model::{CompletedSessionError, QuestionError, TestKind};
use storage::repository::StorageError;

/// Errors emitted while starting or driving a practice session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("a topic is required to start a session")]
    MissingTopic,
    #[error("no questions available for session")]
    EmptyQuestions,
    #[error("no session has been started")]
    NotStarted,
    #[error("session is not completed")]
    NotCompleted,
    #[error(transparent)]
    InvalidQuestion(#[from] QuestionError),
    #[error("session is a {expected} test but question {index} is {found}")]
    KindMismatch {
        expected: TestKind,
        found: TestKind,
        index: usize,
    },
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// True for the rejections `init` produces for bad arguments.
    #[must_use]
    pub fn is_invalid_init(&self) -> bool {
        matches!(
            self,
            SessionError::MissingTopic
                | SessionError::EmptyQuestions
                | SessionError::InvalidQuestion(_)
                | SessionError::KindMismatch { .. }
        )
    }
}

/// Errors emitted by the submit workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmitError {
    #[error("session is not active")]
    NotActive,
    #[error("a submission is already in progress")]
    InProgress,
    #[error("{answered} of {total} questions answered; confirm to submit anyway")]
    ConfirmationRequired { answered: usize, total: usize },
    #[error(transparent)]
    Record(#[from] CompletedSessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SubmitError {
    /// Failures of the persistence effect; the session stays submittable after these.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Storage(_))
    }
}
