use std::sync::Arc;

use practice_core::Clock;
use practice_core::model::{HistoryId, TestId, TestKind};
use storage::Storage;
use storage::repository::{HistoryRepository, QuestionSource};

use crate::config::SessionConfig;
use crate::error::SessionError;

use super::engine::{AdvanceOutcome, SessionEngine, SessionInit};
use super::timer::TickOutcome;

/// Result of advancing past a question in a persisted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionAdvanceResult {
    pub outcome: AdvanceOutcome,
    pub is_complete: bool,
    pub history_id: Option<HistoryId>,
}

/// Orchestrates session start and writes finished sessions to history.
#[derive(Clone)]
pub struct PracticeLoopService {
    clock: Clock,
    config: SessionConfig,
    questions: Arc<dyn QuestionSource>,
    history: Arc<dyn HistoryRepository>,
}

impl PracticeLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionSource>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self {
            clock,
            config: SessionConfig::default(),
            questions,
            history,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.history),
        )
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    #[must_use]
    pub fn history(&self) -> Arc<dyn HistoryRepository> {
        Arc::clone(&self.history)
    }

    /// Fetch a test and start a fresh session for it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the test cannot be fetched, or the
    /// `init` rejection for unusable content.
    pub async fn start_session(
        &self,
        kind: TestKind,
        test_id: TestId,
    ) -> Result<SessionEngine, SessionError> {
        let mut engine = SessionEngine::new(self.config, self.clock);
        self.load_into(&mut engine, kind, test_id).await?;
        Ok(engine)
    }

    /// Reload the engine's current test from the source and start over.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` if the engine never ran a session,
    /// otherwise as [`PracticeLoopService::start_session`].
    pub async fn restart(&self, engine: &mut SessionEngine) -> Result<(), SessionError> {
        let snapshot = engine.snapshot();
        let (Some(test_id), Some(kind)) = (snapshot.session_id, snapshot.test_kind) else {
            return Err(SessionError::NotStarted);
        };
        self.load_into(engine, kind, test_id).await
    }

    async fn load_into(
        &self,
        engine: &mut SessionEngine,
        kind: TestKind,
        test_id: TestId,
    ) -> Result<(), SessionError> {
        engine.begin_loading(test_id)?;

        let loaded = async {
            let topic = self.questions.fetch_topic(test_id).await?;
            let questions = self.questions.fetch_questions(kind, test_id).await?;
            Ok::<_, SessionError>((topic, questions))
        }
        .await;

        let result = loaded.and_then(|(topic, questions)| {
            engine.init(SessionInit {
                session_id: test_id,
                kind,
                topic,
                questions,
            })
        });
        if let Err(err) = &result {
            tracing::warn!(%test_id, %kind, %err, "session failed to start");
            engine.abort_loading();
        }
        result
    }

    /// Advance and persist the session if that advance completed it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submit` if the history write fails. The engine stays
    /// completed and [`PracticeLoopService::finalize`] can retry.
    pub async fn advance(
        &self,
        engine: &mut SessionEngine,
    ) -> Result<SessionAdvanceResult, SessionError> {
        let outcome = engine.advance();
        let history_id = if outcome == AdvanceOutcome::Completed {
            Some(self.finalize(engine).await?)
        } else {
            engine.history_id()
        };
        Ok(SessionAdvanceResult {
            outcome,
            is_complete: engine.needs_finalize() || history_id.is_some(),
            history_id,
        })
    }

    /// One clock pulse; a time-out is persisted right away.
    ///
    /// # Errors
    ///
    /// As [`PracticeLoopService::finalize`].
    pub async fn tick(&self, engine: &mut SessionEngine) -> Result<TickOutcome, SessionError> {
        let outcome = engine.tick();
        if outcome == TickOutcome::Expired {
            self.finalize(engine).await?;
        }
        Ok(outcome)
    }

    /// Learner-initiated submit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submit` for every `SubmitError`.
    pub async fn submit(
        &self,
        engine: &mut SessionEngine,
        confirmed: bool,
    ) -> Result<HistoryId, SessionError> {
        Ok(engine.submit(self.history.as_ref(), confirmed).await?)
    }

    /// Persist a completed session, or return its existing history id.
    ///
    /// Useful when the write at completion failed (e.g. transient storage error).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotCompleted` while the session is still running and
    /// `SessionError::Submit` if persistence fails.
    pub async fn finalize(&self, engine: &mut SessionEngine) -> Result<HistoryId, SessionError> {
        if let Some(id) = engine.history_id() {
            return Ok(id);
        }
        if !engine.needs_finalize() {
            return Err(SessionError::NotCompleted);
        }
        Ok(engine.submit(self.history.as_ref(), true).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::engine::Lifecycle;
    use practice_core::model::{Level, Question, QuestionId, Topic};
    use practice_core::time::fixed_clock;
    use storage::{InMemoryRepository, StorageError, TestBundle};

    fn repo_with_bundle() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.upsert_bundle(TestBundle::new(
            TestKind::Reading,
            Topic::new(TestId::new(11), "Travel", Level::Hsk3),
            vec![
                Question::reading(QuestionId::new(1), "Q1", vec!["a".into(), "b".into()], "1"),
                Question::reading(QuestionId::new(2), "Q2", vec!["a".into(), "b".into()], "2"),
            ],
        ))
        .expect("seed");
        repo
    }

    fn service(repo: &InMemoryRepository) -> PracticeLoopService {
        PracticeLoopService::from_storage(fixed_clock(), &Storage::from_in_memory(repo.clone()))
    }

    #[tokio::test]
    async fn start_session_loads_topic_and_questions() {
        let repo = repo_with_bundle();
        let engine = service(&repo)
            .start_session(TestKind::Reading, TestId::new(11))
            .await
            .expect("start");

        let snap = engine.snapshot();
        assert_eq!(snap.lifecycle, Lifecycle::Active);
        assert_eq!(snap.level, Some(Level::Hsk3));
        assert_eq!(snap.progress.total, 2);
        assert_eq!(snap.timer.total, 1800);
    }

    #[tokio::test]
    async fn start_session_for_unknown_test_fails() {
        let repo = repo_with_bundle();
        let err = service(&repo)
            .start_session(TestKind::Listening, TestId::new(11))
            .await
            .expect_err("wrong kind");
        assert!(matches!(err, SessionError::Storage(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn completing_by_advance_persists_once() {
        let repo = repo_with_bundle();
        let svc = service(&repo);
        let mut engine = svc
            .start_session(TestKind::Reading, TestId::new(11))
            .await
            .expect("start");

        engine.select_answer(0);
        let first = svc.advance(&mut engine).await.expect("advance");
        assert_eq!(first.outcome, AdvanceOutcome::Moved { index: 1 });
        assert!(!first.is_complete);

        let last = svc.advance(&mut engine).await.expect("advance");
        assert_eq!(last.outcome, AdvanceOutcome::Completed);
        assert!(last.is_complete);
        let id = last.history_id.expect("persisted");

        assert_eq!(svc.finalize(&mut engine).await.expect("finalize"), id);
        assert_eq!(repo.history_len().expect("len"), 1);

        let stored = repo.get_completed_session(id).await.expect("stored");
        assert_eq!(stored.score().correct, 1);
        assert_eq!(stored.score().wrong, 1);
    }

    #[tokio::test]
    async fn finalize_before_completion_is_rejected() {
        let repo = repo_with_bundle();
        let svc = service(&repo);
        let mut engine = svc
            .start_session(TestKind::Reading, TestId::new(11))
            .await
            .expect("start");

        assert!(matches!(
            svc.finalize(&mut engine).await,
            Err(SessionError::NotCompleted)
        ));
    }

    #[tokio::test]
    async fn restart_reloads_same_test() {
        let repo = repo_with_bundle();
        let svc = service(&repo);
        let mut engine = svc
            .start_session(TestKind::Reading, TestId::new(11))
            .await
            .expect("start");
        engine.select_answer(1);
        engine.advance();

        svc.restart(&mut engine).await.expect("restart");
        let snap = engine.snapshot();
        assert_eq!(snap.current_index, 0);
        assert_eq!(snap.answered_count, 0);
        assert_eq!(snap.tally.total(), 0);

        let mut fresh = SessionEngine::new(SessionConfig::default(), fixed_clock());
        assert!(matches!(
            svc.restart(&mut fresh).await,
            Err(SessionError::NotStarted)
        ));
    }
}
