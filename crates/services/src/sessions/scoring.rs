use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use practice_core::model::{HistoryEntry, Outcome, Question, QuestionId, rounded_percentage};
use serde::Serialize;

/// Submit workflow flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SubmissionState {
    pub is_submitting: bool,
    pub show_submit_confirmation: bool,
    pub is_ready_to_submit: bool,
}

/// Running tallies kept while the learner advances through the questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Tally {
    pub right: u32,
    pub wrong: u32,
    pub skip: u32,
}

impl Tally {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.right
            .saturating_add(self.wrong)
            .saturating_add(self.skip)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scoring {
    tally: Tally,
    history: BTreeMap<QuestionId, HistoryEntry>,
    submission: SubmissionState,
}

impl Scoring {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments exactly one counter. `was_skipped` wins over `is_correct`.
    pub fn update_score(&mut self, is_correct: bool, was_skipped: bool) {
        let counter = if was_skipped {
            &mut self.tally.skip
        } else if is_correct {
            &mut self.tally.right
        } else {
            &mut self.tally.wrong
        };
        *counter = counter.saturating_add(1);
    }

    pub fn add_to_history(
        &mut self,
        question_id: QuestionId,
        is_correct: bool,
        question: Question,
        graded_at: DateTime<Utc>,
    ) {
        self.record(
            question_id,
            Outcome::from_correctness(is_correct),
            question,
            graded_at,
        );
    }

    /// Upsert the grading record for `question_id`.
    pub fn record(
        &mut self,
        question_id: QuestionId,
        outcome: Outcome,
        question: Question,
        graded_at: DateTime<Utc>,
    ) {
        self.history
            .insert(question_id, HistoryEntry::new(outcome, graded_at, question));
    }

    /// Percentage of `right` over `total_questions`, rounded half up.
    #[must_use]
    pub fn calculate_score(&self, total_questions: usize) -> u32 {
        let total = u32::try_from(total_questions).unwrap_or(u32::MAX);
        rounded_percentage(self.tally.right, total)
    }

    #[must_use]
    pub fn can_submit_test(total_questions: usize, answered_count: usize) -> bool {
        total_questions > 0 && answered_count == total_questions
    }

    pub fn request_confirmation(&mut self) {
        self.submission.show_submit_confirmation = true;
    }

    pub fn dismiss_confirmation(&mut self) {
        self.submission.show_submit_confirmation = false;
    }

    pub fn begin_submit(&mut self) {
        self.submission.is_submitting = true;
    }

    pub fn complete_submit(&mut self) {
        self.submission = SubmissionState {
            is_submitting: false,
            show_submit_confirmation: false,
            is_ready_to_submit: true,
        };
    }

    /// Leaves the confirmation flag as it was so the learner can retry.
    pub fn fail_submit(&mut self) {
        self.submission.is_submitting = false;
    }

    /// Run `effect` with `is_submitting` raised, then settle the flags on its result.
    ///
    /// No retry is attempted; the caller sees the effect's error unchanged.
    ///
    /// # Errors
    ///
    /// Returns whatever error `effect` resolves to.
    pub async fn submit_test<F, Fut, T, E>(&mut self, effect: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.begin_submit();
        let result = effect().await;
        match &result {
            Ok(_) => self.complete_submit(),
            Err(_) => self.fail_submit(),
        }
        result
    }

    #[must_use]
    pub fn tally(&self) -> Tally {
        self.tally
    }

    #[must_use]
    pub fn history(&self) -> &BTreeMap<QuestionId, HistoryEntry> {
        &self.history
    }

    #[must_use]
    pub fn submission(&self) -> SubmissionState {
        self.submission
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submission.is_submitting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::time::fixed_now;

    fn question(id: u64) -> Question {
        Question::reading(
            QuestionId::new(id),
            "pick",
            vec!["a".into(), "b".into()],
            "2",
        )
    }

    #[test]
    fn update_score_increments_exactly_one_counter() {
        let mut scoring = Scoring::new();
        scoring.update_score(true, false);
        scoring.update_score(false, false);
        scoring.update_score(true, true);
        scoring.update_score(false, true);

        let tally = scoring.tally();
        assert_eq!(tally.right, 1);
        assert_eq!(tally.wrong, 1);
        assert_eq!(tally.skip, 2);
        assert_eq!(tally.total(), 4);
    }

    #[test]
    fn history_upserts_by_question_id() {
        let mut scoring = Scoring::new();
        scoring.add_to_history(QuestionId::new(7), false, question(7), fixed_now());
        scoring.add_to_history(QuestionId::new(7), true, question(7), fixed_now());

        assert_eq!(scoring.history().len(), 1);
        assert_eq!(
            scoring.history()[&QuestionId::new(7)].outcome,
            Outcome::Correct
        );
    }

    #[test]
    fn calculate_score_rounds_half_up_and_handles_zero() {
        let mut scoring = Scoring::new();
        assert_eq!(scoring.calculate_score(0), 0);

        scoring.update_score(true, false);
        assert_eq!(scoring.calculate_score(8), 13);
        scoring.update_score(true, false);
        assert_eq!(scoring.calculate_score(3), 67);
        assert_eq!(scoring.calculate_score(4), 50);
    }

    #[test]
    fn can_submit_requires_every_question_answered() {
        assert!(!Scoring::can_submit_test(0, 0));
        assert!(!Scoring::can_submit_test(3, 2));
        assert!(Scoring::can_submit_test(3, 3));
    }

    #[tokio::test]
    async fn submit_test_success_sets_ready_and_clears_flags() {
        let mut scoring = Scoring::new();
        scoring.request_confirmation();

        let result: Result<u8, &str> = scoring.submit_test(|| async { Ok(1) }).await;

        assert_eq!(result, Ok(1));
        assert_eq!(
            scoring.submission(),
            SubmissionState {
                is_submitting: false,
                show_submit_confirmation: false,
                is_ready_to_submit: true,
            }
        );
    }

    #[tokio::test]
    async fn submit_test_failure_only_clears_submitting() {
        let mut scoring = Scoring::new();
        scoring.request_confirmation();

        let result: Result<(), &str> = scoring.submit_test(|| async { Err("offline") }).await;

        assert_eq!(result, Err("offline"));
        let state = scoring.submission();
        assert!(!state.is_submitting);
        assert!(state.show_submit_confirmation);
        assert!(!state.is_ready_to_submit);
    }
}
