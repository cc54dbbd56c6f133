use std::collections::{BTreeMap, BTreeSet};

use practice_core::model::{Answer, Question, rounded_percentage};

use super::progress::{Progress, QuestionStatus};

fn percentage(part: usize, whole: usize) -> u32 {
    let part = u32::try_from(part).unwrap_or(u32::MAX);
    let whole = u32::try_from(whole).unwrap_or(u32::MAX);
    rounded_percentage(part, whole)
}

/// Question list, cursor, answers and reviewed flags for one session.
///
/// Every mutator is a no-op outside the valid index range, so the cursor and the
/// answer keys always stay inside the question list.
#[derive(Debug, Clone, Default)]
pub struct Navigation {
    questions: Vec<Question>,
    current_index: usize,
    answers: BTreeMap<usize, Answer>,
    reviewed: BTreeSet<usize>,
}

impl Navigation {
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        let mut nav = Self::default();
        nav.init_navigation(questions);
        nav
    }

    pub fn init_navigation(&mut self, questions: Vec<Question>) {
        self.questions = questions;
        self.current_index = 0;
        self.answers.clear();
        self.reviewed.clear();
    }

    /// Insert or overwrite the answer at `index`. Returns false if `index` is out of range.
    ///
    /// Answer shape is not checked here; the façade validates option ranges first.
    pub fn set_answer(&mut self, index: usize, answer: Answer) -> bool {
        if index >= self.questions.len() {
            tracing::warn!(index, len = self.questions.len(), "answer for unknown question ignored");
            return false;
        }
        self.answers.insert(index, answer);
        true
    }

    pub fn remove_answer(&mut self, index: usize) -> bool {
        self.answers.remove(&index).is_some()
    }

    /// Move forward one question. Stays put on the last question.
    pub fn next_question(&mut self) -> bool {
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_question(&mut self) -> bool {
        if self.current_index > 0 {
            self.current_index -= 1;
            true
        } else {
            false
        }
    }

    pub fn go_to_question(&mut self, index: usize) -> bool {
        if index < self.questions.len() {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    pub fn mark_reviewed(&mut self, index: usize) -> bool {
        if index < self.questions.len() {
            self.reviewed.insert(index);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    #[must_use]
    pub fn answer(&self, index: usize) -> Option<&Answer> {
        self.answers.get(&index)
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<usize, Answer> {
        &self.answers
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        !self.questions.is_empty() && self.current_index + 1 == self.questions.len()
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        let total = self.questions.len();
        if total == 0 {
            return Progress::default();
        }
        let current = self.current_index + 1;
        Progress {
            current,
            total,
            percentage: percentage(current, total),
        }
    }

    #[must_use]
    pub fn question_status(&self, index: usize) -> QuestionStatus {
        let in_range = index < self.questions.len();
        QuestionStatus {
            index,
            is_answered: self.answers.contains_key(&index),
            is_current: in_range && index == self.current_index,
            is_reviewed: self.reviewed.contains(&index),
            selected_answer: self.answers.get(&index).cloned(),
        }
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<QuestionStatus> {
        (0..self.questions.len())
            .map(|index| self.question_status(index))
            .collect()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.questions.len().saturating_sub(self.answers.len())
    }

    #[must_use]
    pub fn reviewed_count(&self) -> usize {
        self.reviewed.len()
    }

    /// Share of questions answered. Not the same as positional `progress()`.
    #[must_use]
    pub fn progress_percentage(&self) -> u32 {
        percentage(self.answered_count(), self.questions.len())
    }

    /// First unanswered question after the cursor, wrapping once. The cursor is checked last.
    #[must_use]
    pub fn next_unanswered_question(&self) -> Option<usize> {
        let len = self.questions.len();
        (1..=len)
            .map(|step| (self.current_index + step) % len)
            .find(|index| !self.answers.contains_key(index))
    }

    /// First unanswered question before the cursor, wrapping once. The cursor is checked last.
    #[must_use]
    pub fn previous_unanswered_question(&self) -> Option<usize> {
        let len = self.questions.len();
        (1..=len)
            .map(|step| (self.current_index + len - step) % len)
            .find(|index| !self.answers.contains_key(index))
    }
}
