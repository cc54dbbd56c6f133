use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::question::Question;

/// Grading outcome of one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Wrong,
    Skipped,
}

impl Outcome {
    #[must_use]
    pub fn from_correctness(is_correct: bool) -> Self {
        if is_correct {
            Self::Correct
        } else {
            Self::Wrong
        }
    }
}

/// In-session grading record for a question, keyed by question id by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub outcome: Outcome,
    pub graded_at: DateTime<Utc>,
    pub question: Question,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(outcome: Outcome, graded_at: DateTime<Utc>, question: Question) -> Self {
        Self {
            outcome,
            graded_at,
            question,
        }
    }
}
