use async_trait::async_trait;
use practice_core::model::{CompletedSession, HistoryId, Question, TestId, TestKind, Topic};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::bundle::TestBundle;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Where a session's questions and topic come from.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the ordered questions of a test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no test of that kind exists, or other storage errors.
    async fn fetch_questions(
        &self,
        kind: TestKind,
        test_id: TestId,
    ) -> Result<Vec<Question>, StorageError>;

    /// Fetch the topic header of a test. `Ok(None)` when the test is unknown.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the source cannot be reached.
    async fn fetch_topic(&self, test_id: TestId) -> Result<Option<Topic>, StorageError>;
}

/// Opaque history store for finished sessions.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Persist one completed session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the history id was already written.
    async fn save_completed_session(&self, record: &CompletedSession) -> Result<(), StorageError>;

    /// List completed sessions, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_completed_sessions(
        &self,
        limit: u32,
    ) -> Result<Vec<CompletedSession>, StorageError>;

    /// Fetch one completed session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_completed_session(&self, id: HistoryId)
    -> Result<CompletedSession, StorageError>;

    /// Delete one completed session. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_completed_session(&self, id: HistoryId) -> Result<bool, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    bundles: Arc<Mutex<HashMap<TestId, TestBundle>>>,
    history: Arc<Mutex<Vec<CompletedSession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a test bundle.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn upsert_bundle(&self, bundle: TestBundle) -> Result<(), StorageError> {
        let mut guard = self
            .bundles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(bundle.topic.test_id, bundle);
        Ok(())
    }

    /// Number of stored history records.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn history_len(&self) -> Result<usize, StorageError> {
        let guard = self
            .history
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }
}

#[async_trait]
impl QuestionSource for InMemoryRepository {
    async fn fetch_questions(
        &self,
        kind: TestKind,
        test_id: TestId,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .bundles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&test_id)
            .filter(|bundle| bundle.kind == kind)
            .map(|bundle| bundle.questions.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn fetch_topic(&self, test_id: TestId) -> Result<Option<Topic>, StorageError> {
        let guard = self
            .bundles
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&test_id).map(|bundle| bundle.topic.clone()))
    }
}

#[async_trait]
impl HistoryRepository for InMemoryRepository {
    async fn save_completed_session(&self, record: &CompletedSession) -> Result<(), StorageError> {
        let mut guard = self
            .history
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard
            .iter()
            .any(|existing| existing.history_id() == record.history_id())
        {
            return Err(StorageError::Conflict);
        }
        guard.push(record.clone());
        Ok(())
    }

    async fn list_completed_sessions(
        &self,
        limit: u32,
    ) -> Result<Vec<CompletedSession>, StorageError> {
        let guard = self
            .history
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        // Newest insert first, then a stable sort keeps that order among equal timestamps.
        let mut records: Vec<CompletedSession> = guard.iter().rev().cloned().collect();
        records.sort_by(|a, b| b.completed_at().cmp(&a.completed_at()));
        records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(records)
    }

    async fn get_completed_session(
        &self,
        id: HistoryId,
    ) -> Result<CompletedSession, StorageError> {
        let guard = self
            .history
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|record| record.history_id() == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete_completed_session(&self, id: HistoryId) -> Result<bool, StorageError> {
        let mut guard = self
            .history
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let before = guard.len();
        guard.retain(|record| record.history_id() != id);
        Ok(guard.len() != before)
    }
}

/// Aggregates the question source and history store behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionSource>,
    pub history: Arc<dyn HistoryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let questions: Arc<dyn QuestionSource> = Arc::new(repo.clone());
        let history: Arc<dyn HistoryRepository> = Arc::new(repo);
        Self { questions, history }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use practice_core::model::{Answer, Level, QuestionId};
    use practice_core::time::fixed_now;
    use std::collections::BTreeMap;

    fn bundle(test_id: u64) -> TestBundle {
        TestBundle::new(
            TestKind::Listening,
            Topic::new(TestId::new(test_id), "Greetings", Level::Hsk1),
            vec![Question::listening(
                QuestionId::new(1),
                "Q",
                vec!["a".into(), "b".into()],
                "2",
            )],
        )
    }

    fn record(minutes_ago: i64) -> CompletedSession {
        let b = bundle(1);
        CompletedSession::finalize(
            b.topic.test_id,
            b.kind,
            fixed_now() - Duration::minutes(minutes_ago),
            b.topic,
            b.questions,
            BTreeMap::from([(0, Answer::Option(1))]),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetch_questions_requires_matching_kind() {
        let repo = InMemoryRepository::new();
        repo.upsert_bundle(bundle(5)).unwrap();

        let questions = repo
            .fetch_questions(TestKind::Listening, TestId::new(5))
            .await
            .unwrap();
        assert_eq!(questions.len(), 1);

        let err = repo
            .fetch_questions(TestKind::Reading, TestId::new(5))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
        assert!(repo.fetch_topic(TestId::new(6)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_lists_newest_first_and_deletes() {
        let repo = InMemoryRepository::new();
        let older = record(30);
        let newer = record(5);
        repo.save_completed_session(&older).await.unwrap();
        repo.save_completed_session(&newer).await.unwrap();

        let listed = repo.list_completed_sessions(10).await.unwrap();
        assert_eq!(listed[0].history_id(), newer.history_id());
        assert_eq!(listed[1].history_id(), older.history_id());

        assert!(repo.delete_completed_session(older.history_id()).await.unwrap());
        assert!(!repo.delete_completed_session(older.history_id()).await.unwrap());
        assert_eq!(repo.history_len().unwrap(), 1);
    }

    #[tokio::test]
    async fn saving_same_history_id_twice_conflicts() {
        let repo = InMemoryRepository::new();
        let rec = record(1);
        repo.save_completed_session(&rec).await.unwrap();
        let err = repo.save_completed_session(&rec).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }
}
