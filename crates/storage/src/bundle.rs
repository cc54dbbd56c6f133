use std::path::Path;

use practice_core::model::{Question, QuestionError, TestKind, Topic};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BundleError {
    #[error("failed to read bundle: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse bundle: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error("bundle is a {bundle} test but question {index} is {question}")]
    KindMismatch {
        bundle: TestKind,
        question: TestKind,
        index: usize,
    },
}

/// A practice test as the question bank ships it: header plus ordered questions.
///
/// This is the JSON shape used by the seed binary and the SQLite `test_bundles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestBundle {
    pub kind: TestKind,
    pub topic: Topic,
    pub questions: Vec<Question>,
}

impl TestBundle {
    #[must_use]
    pub fn new(kind: TestKind, topic: Topic, questions: Vec<Question>) -> Self {
        Self {
            kind,
            topic,
            questions,
        }
    }

    /// Load and validate a bundle from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `BundleError` if the file cannot be read, parsed, or fails validation.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        let raw = std::fs::read_to_string(path)?;
        let bundle: Self = serde_json::from_str(&raw)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Every question must be valid and of the bundle's kind.
    ///
    /// # Errors
    ///
    /// Returns the first `BundleError` found.
    pub fn validate(&self) -> Result<(), BundleError> {
        for (index, question) in self.questions.iter().enumerate() {
            if question.kind() != self.kind {
                return Err(BundleError::KindMismatch {
                    bundle: self.kind,
                    question: question.kind(),
                    index,
                });
            }
            question.validate()?;
        }
        Ok(())
    }
}
