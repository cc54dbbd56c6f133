use chrono::{DateTime, Utc};
use std::sync::Arc;

use practice_core::model::{CompletedSession, HistoryId, Level, TestId, TestKind};
use storage::repository::HistoryRepository;

use crate::Clock;
use crate::error::SessionError;

/// Presentation-agnostic list item for a completed session.
///
/// No pre-formatted strings; the UI formats timestamps and percentages itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryListItem {
    pub history_id: HistoryId,
    pub test_id: TestId,
    pub test_kind: TestKind,
    pub level: Level,
    pub title: String,
    pub completed_at: DateTime<Utc>,

    pub correct: u32,
    pub wrong: u32,
    pub skipped: u32,
    pub total: u32,
    pub percentage: u32,
}

impl HistoryListItem {
    #[must_use]
    pub fn from_record(record: &CompletedSession) -> Self {
        let score = record.score();
        Self {
            history_id: record.history_id(),
            test_id: record.test_id(),
            test_kind: record.test_kind(),
            level: record.level(),
            title: record.topic().title.clone(),
            completed_at: record.completed_at(),
            correct: score.correct,
            wrong: score.wrong,
            skipped: score.skipped,
            total: score.total,
            percentage: score.percentage,
        }
    }
}

/// Read side of the history store for list and detail screens.
#[derive(Clone)]
pub struct HistoryService {
    clock: Clock,
    history: Arc<dyn HistoryRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(clock: Clock, history: Arc<dyn HistoryRepository>) -> Self {
        Self { clock, history }
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::new(
            clock,
            Arc::new(storage::repository::InMemoryRepository::new()),
        )
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Most recent completed sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<HistoryListItem>, SessionError> {
        let records = self.history.list_completed_sessions(limit).await?;
        Ok(records.iter().map(HistoryListItem::from_record).collect())
    }

    /// Recent attempts at one test, newest first, scanning at most `limit` records.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn attempts_for_test(
        &self,
        test_id: TestId,
        limit: u32,
    ) -> Result<Vec<HistoryListItem>, SessionError> {
        let records = self.history.list_completed_sessions(limit).await?;
        Ok(records
            .iter()
            .filter(|record| record.test_id() == test_id)
            .map(HistoryListItem::from_record)
            .collect())
    }

    /// Full record, including questions and answers, for review.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the record is missing or access fails.
    pub async fn get(&self, id: HistoryId) -> Result<CompletedSession, SessionError> {
        Ok(self.history.get_completed_session(id).await?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn delete(&self, id: HistoryId) -> Result<bool, SessionError> {
        let removed = self.history.delete_completed_session(id).await?;
        if removed {
            tracing::info!(history_id = %id, "history record deleted");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use practice_core::model::{Answer, Question, QuestionId, Topic};
    use practice_core::time::fixed_now;
    use std::collections::BTreeMap;
    use storage::StorageError;
    use storage::repository::InMemoryRepository;

    fn record(test_id: u64, minutes_ago: i64, answer: usize) -> CompletedSession {
        CompletedSession::finalize(
            TestId::new(test_id),
            TestKind::Reading,
            fixed_now() - Duration::minutes(minutes_ago),
            Topic::new(TestId::new(test_id), "Food", Level::Hsk4),
            vec![Question::reading(
                QuestionId::new(1),
                "Q",
                vec!["a".into(), "b".into()],
                "1",
            )],
            BTreeMap::from([(0, Answer::Option(answer))]),
        )
        .expect("record")
    }

    #[test]
    fn list_item_copies_score_fields() {
        let rec = record(5, 0, 0);
        let item = HistoryListItem::from_record(&rec);

        assert_eq!(item.history_id, rec.history_id());
        assert_eq!(item.title, "Food");
        assert_eq!(item.level, Level::Hsk4);
        assert_eq!((item.correct, item.wrong, item.total), (1, 0, 1));
        assert_eq!(item.percentage, 100);
    }

    #[tokio::test]
    async fn list_recent_and_attempts_for_test() {
        let repo = InMemoryRepository::new();
        repo.save_completed_session(&record(1, 30, 0)).await.expect("save");
        repo.save_completed_session(&record(2, 20, 1)).await.expect("save");
        repo.save_completed_session(&record(1, 10, 1)).await.expect("save");

        let svc = HistoryService::new(Clock::Fixed(fixed_now()), Arc::new(repo));

        let items = svc.list_recent(2).await.expect("list");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].completed_at, fixed_now() - Duration::minutes(10));
        assert_eq!(items[1].test_id, TestId::new(2));

        let attempts = svc.attempts_for_test(TestId::new(1), 10).await.expect("attempts");
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].percentage, 0);
        assert_eq!(attempts[1].percentage, 100);
    }

    #[tokio::test]
    async fn get_and_delete_round_trip() {
        let svc = HistoryService::in_memory(Clock::Fixed(fixed_now()));
        let missing = record(1, 0, 0).history_id();

        assert!(matches!(
            svc.get(missing).await,
            Err(SessionError::Storage(StorageError::NotFound))
        ));
        assert!(!svc.delete(missing).await.expect("delete"));
        assert_eq!(svc.now(), fixed_now());
    }
}
