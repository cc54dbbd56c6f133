use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::history::Outcome;
use crate::model::ids::{HistoryId, TestId};
use crate::model::level::Level;
use crate::model::question::{Answer, Question, TestKind};
use crate::model::score::ScoreSummary;
use crate::model::topic::Topic;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletedSessionError {
    #[error("score total ({total}) does not match question count ({questions})")]
    TotalMismatch { total: u32, questions: usize },

    #[error("graded count ({graded}) exceeds score total ({total})")]
    CountOverflow { graded: u32, total: u32 },

    #[error("answer recorded for question index {index} but only {len} questions exist")]
    AnswerOutOfRange { index: usize, len: usize },

    #[error("too many questions for a single session: {len}")]
    TooManyQuestions { len: usize },
}

/// Persisted summary of one finished attempt at a practice test.
///
/// Independent of the live session: once written, nothing in the engine mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSession {
    history_id: HistoryId,
    test_id: TestId,
    test_kind: TestKind,
    completed_at: DateTime<Utc>,
    topic: Topic,
    questions: Vec<Question>,
    selected_answers: BTreeMap<usize, Answer>,
    score: ScoreSummary,
    level: Level,
}

impl CompletedSession {
    /// Rehydrate a record from storage, re-checking its counts.
    ///
    /// # Errors
    ///
    /// Returns `CompletedSessionError` if the score or answers disagree with the question list.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        history_id: HistoryId,
        test_id: TestId,
        test_kind: TestKind,
        completed_at: DateTime<Utc>,
        topic: Topic,
        questions: Vec<Question>,
        selected_answers: BTreeMap<usize, Answer>,
        score: ScoreSummary,
        level: Level,
    ) -> Result<Self, CompletedSessionError> {
        let len = questions.len();
        if usize::try_from(score.total).ok() != Some(len) {
            return Err(CompletedSessionError::TotalMismatch {
                total: score.total,
                questions: len,
            });
        }
        if score.graded() > score.total {
            return Err(CompletedSessionError::CountOverflow {
                graded: score.graded(),
                total: score.total,
            });
        }
        if let Some((&index, _)) = selected_answers.iter().find(|(index, _)| **index >= len) {
            return Err(CompletedSessionError::AnswerOutOfRange { index, len });
        }

        Ok(Self {
            history_id,
            test_id,
            test_kind,
            completed_at,
            topic,
            questions,
            selected_answers,
            score,
            level,
        })
    }

    /// Grade a finished attempt and build its record.
    ///
    /// Answered multiple-choice questions count as correct or wrong, unanswered
    /// questions count as wrong, and written answers are left ungraded (skipped)
    /// because they are scored outside this engine.
    ///
    /// # Errors
    ///
    /// Returns `CompletedSessionError` if the question count does not fit in `u32`
    /// or an answer key is out of range.
    pub fn finalize(
        test_id: TestId,
        test_kind: TestKind,
        completed_at: DateTime<Utc>,
        topic: Topic,
        questions: Vec<Question>,
        selected_answers: BTreeMap<usize, Answer>,
    ) -> Result<Self, CompletedSessionError> {
        let total = u32::try_from(questions.len()).map_err(|_| {
            CompletedSessionError::TooManyQuestions {
                len: questions.len(),
            }
        })?;

        let mut correct = 0_u32;
        let mut wrong = 0_u32;
        let mut skipped = 0_u32;
        for (index, question) in questions.iter().enumerate() {
            match final_outcome(question, selected_answers.get(&index)) {
                Outcome::Correct => correct = correct.saturating_add(1),
                Outcome::Wrong => wrong = wrong.saturating_add(1),
                Outcome::Skipped => skipped = skipped.saturating_add(1),
            }
        }

        let level = topic.level;
        Self::from_persisted(
            HistoryId::generate(),
            test_id,
            test_kind,
            completed_at,
            topic,
            questions,
            selected_answers,
            ScoreSummary::from_counts(correct, wrong, skipped, total),
            level,
        )
    }

    #[must_use]
    pub fn history_id(&self) -> HistoryId {
        self.history_id
    }

    #[must_use]
    pub fn test_id(&self) -> TestId {
        self.test_id
    }

    #[must_use]
    pub fn test_kind(&self) -> TestKind {
        self.test_kind
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn selected_answers(&self) -> &BTreeMap<usize, Answer> {
        &self.selected_answers
    }

    #[must_use]
    pub fn score(&self) -> ScoreSummary {
        self.score
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }
}

fn final_outcome(question: &Question, answer: Option<&Answer>) -> Outcome {
    match answer {
        None => Outcome::Wrong,
        Some(Answer::Option(index)) if question.is_multiple_choice() => {
            Outcome::from_correctness(question.is_correct_option(*index))
        }
        Some(Answer::Text(_)) if !question.is_multiple_choice() => Outcome::Skipped,
        Some(_) => Outcome::Wrong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;
    use crate::time::fixed_now;

    fn reading(id: u64, correct: &str) -> Question {
        Question::reading(
            QuestionId::new(id),
            format!("Q{id}"),
            vec!["a".into(), "b".into(), "c".into()],
            correct,
        )
    }

    fn topic() -> Topic {
        Topic::new(TestId::new(9), "Reading 9", Level::Hsk2)
    }

    #[test]
    fn finalize_scores_unanswered_as_wrong() {
        let questions = vec![reading(1, "1"), reading(2, "2"), reading(3, "3"), reading(4, "1")];
        let mut answers = BTreeMap::new();
        answers.insert(0, Answer::Option(0));
        answers.insert(1, Answer::Option(0));

        let record = CompletedSession::finalize(
            TestId::new(9),
            TestKind::Reading,
            fixed_now(),
            topic(),
            questions,
            answers,
        )
        .unwrap();

        let score = record.score();
        assert_eq!(score.correct, 1);
        assert_eq!(score.wrong, 3);
        assert_eq!(score.skipped, 0);
        assert_eq!(score.total, 4);
        assert_eq!(score.percentage, 25);
        assert_eq!(record.level(), Level::Hsk2);
    }

    #[test]
    fn finalize_leaves_written_answers_ungraded() {
        let questions = vec![
            Question::writing(QuestionId::new(1), "Write about food."),
            Question::writing(QuestionId::new(2), "Write about travel."),
        ];
        let mut answers = BTreeMap::new();
        answers.insert(0, Answer::Text("我喜欢饺子".into()));

        let record = CompletedSession::finalize(
            TestId::new(3),
            TestKind::Writing,
            fixed_now(),
            topic(),
            questions,
            answers,
        )
        .unwrap();

        assert_eq!(record.score().skipped, 1);
        assert_eq!(record.score().wrong, 1);
    }

    #[test]
    fn from_persisted_rejects_total_mismatch() {
        let err = CompletedSession::from_persisted(
            HistoryId::generate(),
            TestId::new(1),
            TestKind::Reading,
            fixed_now(),
            topic(),
            vec![reading(1, "1")],
            BTreeMap::new(),
            ScoreSummary::from_counts(0, 0, 0, 2),
            Level::Hsk2,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompletedSessionError::TotalMismatch {
                total: 2,
                questions: 1
            }
        );
    }

    #[test]
    fn from_persisted_rejects_answer_keys_outside_questions() {
        let mut answers = BTreeMap::new();
        answers.insert(5, Answer::Option(0));
        let err = CompletedSession::from_persisted(
            HistoryId::generate(),
            TestId::new(1),
            TestKind::Reading,
            fixed_now(),
            topic(),
            vec![reading(1, "1")],
            answers,
            ScoreSummary::from_counts(0, 1, 0, 1),
            Level::Hsk2,
        )
        .unwrap_err();
        assert_eq!(err, CompletedSessionError::AnswerOutOfRange { index: 5, len: 1 });
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = CompletedSession::finalize(
            TestId::new(9),
            TestKind::Reading,
            fixed_now(),
            topic(),
            vec![reading(1, "2")],
            BTreeMap::from([(0, Answer::Option(1))]),
        )
        .unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: CompletedSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.score().percentage, 100);
    }
}
