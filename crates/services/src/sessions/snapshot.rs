use practice_core::model::{HistoryId, Level, Question, ScoreSummary, TestId, TestKind, Topic};
use serde::Serialize;

use super::engine::Lifecycle;
use super::presentation::PresentationState;
use super::progress::{Progress, QuestionStatus};
use super::scoring::{SubmissionState, Tally};
use super::timer::TimerState;

/// Merged read-only view of every subsystem, assembled on demand for the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub lifecycle: Lifecycle,
    pub session_id: Option<TestId>,
    pub test_kind: Option<TestKind>,
    pub level: Option<Level>,
    pub topic: Option<Topic>,

    pub timer: TimerState,
    pub remaining_secs: u32,

    pub current_index: usize,
    pub current_question: Option<Question>,
    pub progress: Progress,
    pub statuses: Vec<QuestionStatus>,
    pub answered_count: usize,
    pub unanswered_count: usize,
    pub reviewed_count: usize,
    pub answered_percentage: u32,
    pub is_last_question: bool,

    pub presentation: PresentationState,

    pub tally: Tally,
    pub score_percentage: u32,
    pub submission: SubmissionState,
    pub can_submit: bool,
    pub history_id: Option<HistoryId>,
    pub final_score: Option<ScoreSummary>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.lifecycle == Lifecycle::Completed
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.history_id.is_some()
    }
}
