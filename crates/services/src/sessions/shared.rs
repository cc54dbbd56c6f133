use std::sync::Arc;

use practice_core::model::HistoryId;
use storage::repository::HistoryRepository;
use tokio::sync::Mutex;

use crate::error::SubmitError;

use super::engine::{Lifecycle, SessionEngine, SubmitPlan};
use super::snapshot::SessionSnapshot;
use super::timer::TickOutcome;

/// Cloneable handle for hosts that drive one engine from several tasks.
///
/// Submission never holds the lock across the history write, so ticks keep
/// flowing while it runs and a second submit sees `is_submitting`.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionEngine>>,
}

impl SharedSession {
    #[must_use]
    pub fn new(engine: SessionEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub async fn with<R>(&self, f: impl FnOnce(&mut SessionEngine) -> R) -> R {
        let mut engine = self.inner.lock().await;
        f(&mut engine)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn tick(&self) -> TickOutcome {
        self.inner.lock().await.tick()
    }

    /// Two-phase submit: plan under the lock, write without it, settle under it again.
    ///
    /// While the write runs the engine accepts ticks only; answers and navigation
    /// are rejected so the saved record matches the session.
    ///
    /// # Errors
    ///
    /// As [`SessionEngine::begin_submit`] and [`SessionEngine::finish_submit`].
    pub async fn submit(
        &self,
        history: &dyn HistoryRepository,
        confirmed: bool,
    ) -> Result<HistoryId, SubmitError> {
        let plan = self.inner.lock().await.begin_submit(confirmed)?;
        let record = match plan {
            SubmitPlan::AlreadyPersisted(id) => return Ok(id),
            SubmitPlan::Persist(record) => record,
        };

        let result = history.save_completed_session(&record).await;
        self.inner.lock().await.finish_submit(&record, result)
    }

    /// Persist a session that completed on its own (last advance or time-out).
    ///
    /// Returns `Ok(None)` while the session is still running.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError` if the history write fails.
    pub async fn finalize_if_completed(
        &self,
        history: &dyn HistoryRepository,
    ) -> Result<Option<HistoryId>, SubmitError> {
        let (lifecycle, persisted) = self
            .with(|engine| (engine.lifecycle(), engine.history_id()))
            .await;
        if lifecycle != Lifecycle::Completed {
            return Ok(None);
        }
        if let Some(id) = persisted {
            return Ok(Some(id));
        }
        self.submit(history, true).await.map(Some)
    }
}
