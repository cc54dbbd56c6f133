use practice_core::model::Answer;
use serde::Serialize;

/// Position-based progress: which question is on screen out of how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: u32,
}

/// Per-question state for the question grid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QuestionStatus {
    pub index: usize,
    pub is_answered: bool,
    pub is_current: bool,
    pub is_reviewed: bool,
    pub selected_answer: Option<Answer>,
}
