use chrono::{DateTime, Utc};
use practice_core::Clock;
use practice_core::model::{
    Answer, CompletedSession, HistoryId, Outcome, Question, ScoreSummary, TestId, TestKind, Topic,
};
use serde::Serialize;
use storage::repository::{HistoryRepository, StorageError};

use crate::config::SessionConfig;
use crate::error::{SessionError, SubmitError};

use super::navigation::Navigation;
use super::presentation::{FontSize, Presentation};
use super::scoring::Scoring;
use super::snapshot::SessionSnapshot;
use super::timer::{TickOutcome, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Loading,
    Active,
    Completed,
}

/// Everything `SessionEngine::init` needs to start a session.
#[derive(Debug, Clone)]
pub struct SessionInit {
    pub session_id: TestId,
    pub kind: TestKind,
    pub topic: Option<Topic>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Recorded { is_correct: bool },
    /// Stored without grading (written answers).
    Ungraded,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved { index: usize },
    /// The advance was made from the last question.
    Completed,
    Ignored,
}

/// First half of a submission: what the caller has to persist, if anything.
#[derive(Debug, Clone)]
pub enum SubmitPlan {
    Persist(CompletedSession),
    AlreadyPersisted(HistoryId),
}

#[derive(Debug, Clone)]
struct ActiveSession {
    session_id: TestId,
    kind: TestKind,
    topic: Topic,
}

/// Single-owner façade over the timer, navigation, presentation and scoring state
/// of one practice session.
///
/// Each event method fans out to the subsystems in a fixed order so the merged
/// [`SessionSnapshot`] never shows a half-applied transition.
#[derive(Debug, Clone)]
pub struct SessionEngine {
    config: SessionConfig,
    clock: Clock,
    lifecycle: Lifecycle,
    loading_id: Option<TestId>,
    active: Option<ActiveSession>,
    timer: Timer,
    navigation: Navigation,
    presentation: Presentation,
    scoring: Scoring,
    completed_at: Option<DateTime<Utc>>,
    persisted: Option<HistoryId>,
    /// Record handed out by `begin_submit` and not yet settled.
    pending_submit: Option<HistoryId>,
    final_score: Option<ScoreSummary>,
}

impl SessionEngine {
    #[must_use]
    pub fn new(config: SessionConfig, clock: Clock) -> Self {
        Self {
            config,
            clock,
            lifecycle: Lifecycle::Uninitialized,
            loading_id: None,
            active: None,
            timer: Timer::default(),
            navigation: Navigation::default(),
            presentation: Presentation::new(config.font_size),
            scoring: Scoring::new(),
            completed_at: None,
            persisted: None,
            pending_submit: None,
            final_score: None,
        }
    }

    //
    // ─── LIFECYCLE ────────────────────────────────────────────────────────────
    //

    /// Drop any current session and wait for `init`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submit(SubmitError::InProgress)` while a submission
    /// is being written.
    pub fn begin_loading(&mut self, session_id: TestId) -> Result<(), SessionError> {
        if self.rejects_while_submitting("begin_loading") {
            return Err(SubmitError::InProgress.into());
        }
        self.reset();
        self.lifecycle = Lifecycle::Loading;
        self.loading_id = Some(session_id);
        tracing::debug!(%session_id, "session loading");
        Ok(())
    }

    /// Back out of a failed load. No effect outside `Loading`.
    pub fn abort_loading(&mut self) {
        if self.lifecycle == Lifecycle::Loading {
            self.lifecycle = Lifecycle::Uninitialized;
            self.loading_id = None;
        }
    }

    /// Validate `init` and rebuild every subsystem from it, then start the timer.
    ///
    /// A rejected `init` leaves the engine exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingTopic`, `EmptyQuestions`, `InvalidQuestion` or
    /// `KindMismatch` for unusable input, and `SessionError::Submit` while a
    /// submission is being written.
    pub fn init(&mut self, init: SessionInit) -> Result<(), SessionError> {
        if self.rejects_while_submitting("init") {
            return Err(SubmitError::InProgress.into());
        }
        let SessionInit {
            session_id,
            kind,
            topic,
            questions,
        } = init;

        let Some(topic) = topic else {
            tracing::warn!(%session_id, "init rejected: missing topic");
            return Err(SessionError::MissingTopic);
        };
        if questions.is_empty() {
            tracing::warn!(%session_id, "init rejected: no questions");
            return Err(SessionError::EmptyQuestions);
        }
        for (index, question) in questions.iter().enumerate() {
            if question.kind() != kind {
                tracing::warn!(%session_id, index, "init rejected: question kind mismatch");
                return Err(SessionError::KindMismatch {
                    expected: kind,
                    found: question.kind(),
                    index,
                });
            }
            question.validate().inspect_err(|err| {
                tracing::warn!(%session_id, index, %err, "init rejected: invalid question");
            })?;
        }

        let level = topic.level;
        let len = questions.len();
        let mut timer = Timer::new(level);
        timer.start();

        self.timer = timer;
        self.navigation = Navigation::new(questions);
        self.presentation = Presentation::new(self.presentation.state().font_size);
        self.scoring = Scoring::new();
        self.active = Some(ActiveSession {
            session_id,
            kind,
            topic,
        });
        self.loading_id = None;
        self.completed_at = None;
        self.persisted = None;
        self.final_score = None;
        self.lifecycle = Lifecycle::Active;

        tracing::info!(%session_id, %kind, %level, questions = len, "session started");
        Ok(())
    }

    /// Back to `Uninitialized`. The chosen font size survives.
    pub fn reset(&mut self) {
        let font_size = self.presentation.state().font_size;
        *self = Self::new(self.config, self.clock);
        self.presentation.set_font_size(font_size);
    }

    //
    // ─── ANSWERS ──────────────────────────────────────────────────────────────
    //

    /// Select an option on the current multiple-choice question.
    ///
    /// Order: navigation answer, presentation answer flags, feedback flag, history record.
    pub fn select_answer(&mut self, option_index: usize) -> AnswerOutcome {
        let Some(question) = self.current_for_answer("select_answer") else {
            return AnswerOutcome::Ignored;
        };
        if !question.is_multiple_choice() {
            tracing::warn!(question_id = %question.id, "option selected on a written question");
            return AnswerOutcome::Ignored;
        }
        if !question.has_option(option_index) {
            tracing::warn!(
                question_id = %question.id,
                option_index,
                options = question.options.len(),
                "option index out of range"
            );
            return AnswerOutcome::Ignored;
        }

        let index = self.navigation.current_index();
        let is_correct = question.is_correct_option(option_index);

        self.navigation
            .set_answer(index, Answer::Option(option_index));
        self.presentation.set_answer_result(true, is_correct);
        if self.config.show_answer_after_each {
            self.presentation.set_show_answer_feedback(true);
        }
        self.scoring
            .add_to_history(question.id, is_correct, question.clone(), self.clock.now());

        tracing::debug!(index, option_index, is_correct, "answer selected");
        AnswerOutcome::Recorded { is_correct }
    }

    /// Store free text for the current written question. Blank text is ignored.
    pub fn write_answer(&mut self, text: impl Into<String>) -> AnswerOutcome {
        let text = text.into();
        let Some(question) = self.current_for_answer("write_answer") else {
            return AnswerOutcome::Ignored;
        };
        if question.is_multiple_choice() {
            tracing::warn!(question_id = %question.id, "text answer on a multiple-choice question");
            return AnswerOutcome::Ignored;
        }
        if text.trim().is_empty() {
            return AnswerOutcome::Ignored;
        }

        let index = self.navigation.current_index();
        self.navigation.set_answer(index, Answer::Text(text));
        self.presentation.set_answer_result(true, false);
        self.scoring
            .record(question.id, Outcome::Skipped, question, self.clock.now());

        tracing::debug!(index, "written answer stored");
        AnswerOutcome::Ungraded
    }

    /// Remove the current question's answer.
    pub fn clear_answer(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Active || self.rejects_while_submitting("clear_answer") {
            return false;
        }
        let removed = self.navigation.remove_answer(self.navigation.current_index());
        if removed {
            self.presentation.reset_answer_state();
        }
        removed
    }

    fn current_for_answer(&self, event: &'static str) -> Option<Question> {
        if self.lifecycle != Lifecycle::Active {
            tracing::debug!(lifecycle = ?self.lifecycle, "answer ignored outside an active session");
            return None;
        }
        if self.rejects_while_submitting(event) {
            return None;
        }
        self.navigation.current_question().cloned()
    }

    /// The record being written was built from the current answers, so nothing
    /// may change them until the write settles. Ticks are still accepted.
    fn rejects_while_submitting(&self, event: &'static str) -> bool {
        let Some(history_id) = self.pending_submit else {
            return false;
        };
        tracing::warn!(event, %history_id, "event rejected while a submission is in flight");
        true
    }

    //
    // ─── NAVIGATION ───────────────────────────────────────────────────────────
    //

    /// Tally the current question and move on. Advancing from the last question
    /// completes the session.
    pub fn advance(&mut self) -> AdvanceOutcome {
        if self.lifecycle != Lifecycle::Active || self.rejects_while_submitting("advance") {
            return AdvanceOutcome::Ignored;
        }

        let written = self
            .navigation
            .current_question()
            .is_some_and(|q| !q.is_multiple_choice());
        if self.presentation.is_answer_selected() && !written {
            self.scoring
                .update_score(self.presentation.is_answer_correct(), false);
        } else {
            self.scoring.update_score(false, true);
        }

        let was_last = self.navigation.is_last_question();
        self.navigation.next_question();
        self.reset_presentation();

        if was_last {
            self.complete();
            AdvanceOutcome::Completed
        } else {
            AdvanceOutcome::Moved {
                index: self.navigation.current_index(),
            }
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Active || self.rejects_while_submitting("previous") {
            return false;
        }
        let moved = self.navigation.previous_question();
        if moved {
            self.reset_presentation();
        }
        moved
    }

    pub fn go_to(&mut self, index: usize) -> bool {
        if self.lifecycle != Lifecycle::Active || self.rejects_while_submitting("go_to") {
            return false;
        }
        let moved = self.navigation.go_to_question(index);
        if moved {
            self.reset_presentation();
        } else {
            tracing::warn!(index, len = self.navigation.len(), "go_to index out of range");
        }
        moved
    }

    /// Jump to the next unanswered question, wrapping around the list.
    pub fn go_to_next_unanswered(&mut self) -> Option<usize> {
        let index = self.navigation.next_unanswered_question()?;
        self.go_to(index).then_some(index)
    }

    pub fn mark_reviewed(&mut self, index: usize) -> bool {
        self.lifecycle == Lifecycle::Active
            && !self.rejects_while_submitting("mark_reviewed")
            && self.navigation.mark_reviewed(index)
    }

    fn reset_presentation(&mut self) {
        self.presentation.reset_answer_state();
        self.presentation.collapse_panels();
    }

    //
    // ─── PRESENTATION ─────────────────────────────────────────────────────────
    //

    pub fn toggle_translation(&mut self) {
        self.presentation.toggle_translation();
    }

    pub fn toggle_explanation(&mut self) {
        self.presentation.toggle_explanation();
    }

    pub fn toggle_transcript(&mut self) {
        self.presentation.toggle_transcript();
    }

    pub fn set_font_size(&mut self, font_size: FontSize) {
        self.presentation.set_font_size(font_size);
    }

    //
    // ─── TIMER ────────────────────────────────────────────────────────────────
    //

    pub fn pause_timer(&mut self) {
        self.timer.pause();
    }

    pub fn resume_timer(&mut self) {
        if self.lifecycle == Lifecycle::Active {
            self.timer.start();
        }
    }

    /// One clock pulse. Expiry completes the session.
    pub fn tick(&mut self) -> TickOutcome {
        if self.lifecycle != Lifecycle::Active {
            return TickOutcome::Idle;
        }
        let mut expired = false;
        let outcome = self.timer.tick(|| expired = true);
        if expired {
            tracing::info!("time is up");
            self.complete();
        }
        outcome
    }

    /// Move to `Completed` and stop the timer. Repeated calls change nothing.
    fn complete(&mut self) {
        if self.lifecycle == Lifecycle::Completed {
            return;
        }
        self.lifecycle = Lifecycle::Completed;
        self.timer.pause();
        let now = self.clock.now();
        self.completed_at.get_or_insert(now);
        tracing::info!(
            answered = self.navigation.answered_count(),
            total = self.navigation.len(),
            "session completed"
        );
    }

    //
    // ─── SUBMISSION ───────────────────────────────────────────────────────────
    //

    /// Check that a submission may start and build the record to persist.
    ///
    /// On `SubmitPlan::Persist` the engine is marked as submitting until
    /// [`SessionEngine::finish_submit`] settles that record. Until then answers,
    /// navigation, `init` and `begin_loading` are rejected.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::NotActive`, `InProgress`, `ConfirmationRequired` or
    /// `Record`.
    pub fn begin_submit(&mut self, confirmed: bool) -> Result<SubmitPlan, SubmitError> {
        let plan = self.prepare_submit(confirmed)?;
        if let SubmitPlan::Persist(record) = &plan {
            self.scoring.begin_submit();
            self.pending_submit = Some(record.history_id());
        }
        Ok(plan)
    }

    /// Settle a submission started with [`SessionEngine::begin_submit`].
    ///
    /// A record other than the pending one (for example from before a `reset`)
    /// leaves the engine untouched.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::Storage` when the write failed; the engine can be
    /// submitted again.
    pub fn finish_submit(
        &mut self,
        record: &CompletedSession,
        result: Result<(), StorageError>,
    ) -> Result<HistoryId, SubmitError> {
        if self.pending_submit != Some(record.history_id()) {
            tracing::warn!(history_id = %record.history_id(), "stale submission settled; session unchanged");
            return result
                .map(|()| record.history_id())
                .map_err(SubmitError::from);
        }
        self.pending_submit = None;
        match result {
            Ok(()) => {
                self.scoring.complete_submit();
                self.mark_persisted(record);
                Ok(record.history_id())
            }
            Err(err) => {
                self.scoring.fail_submit();
                tracing::warn!(%err, "submission failed");
                Err(SubmitError::Storage(err))
            }
        }
    }

    /// Build, persist and settle in one call for single-owner hosts.
    ///
    /// # Errors
    ///
    /// As [`SessionEngine::begin_submit`] and [`SessionEngine::finish_submit`].
    pub async fn submit(
        &mut self,
        history: &dyn HistoryRepository,
        confirmed: bool,
    ) -> Result<HistoryId, SubmitError> {
        let record = match self.prepare_submit(confirmed)? {
            SubmitPlan::AlreadyPersisted(id) => return Ok(id),
            SubmitPlan::Persist(record) => record,
        };

        let saved = self
            .scoring
            .submit_test(|| history.save_completed_session(&record))
            .await;
        match saved {
            Ok(()) => {
                self.mark_persisted(&record);
                Ok(record.history_id())
            }
            Err(err) => {
                tracing::warn!(%err, "submission failed");
                Err(SubmitError::Storage(err))
            }
        }
    }

    /// Clear the confirmation prompt without submitting.
    pub fn dismiss_submit_confirmation(&mut self) {
        self.scoring.dismiss_confirmation();
    }

    fn prepare_submit(&mut self, confirmed: bool) -> Result<SubmitPlan, SubmitError> {
        if !matches!(self.lifecycle, Lifecycle::Active | Lifecycle::Completed) {
            return Err(SubmitError::NotActive);
        }
        if let Some(id) = self.persisted {
            return Ok(SubmitPlan::AlreadyPersisted(id));
        }
        if self.scoring.is_submitting() {
            tracing::warn!("submit rejected: already submitting");
            return Err(SubmitError::InProgress);
        }
        let active = self.active.as_ref().ok_or(SubmitError::NotActive)?;

        let total = self.navigation.len();
        let answered = self.navigation.answered_count();
        if !confirmed && !Scoring::can_submit_test(total, answered) {
            self.scoring.request_confirmation();
            return Err(SubmitError::ConfirmationRequired { answered, total });
        }

        let completed_at = self.completed_at.unwrap_or_else(|| self.clock.now());
        let record = CompletedSession::finalize(
            active.session_id,
            active.kind,
            completed_at,
            active.topic.clone(),
            self.navigation.questions().to_vec(),
            self.navigation.answers().clone(),
        )?;
        Ok(SubmitPlan::Persist(record))
    }

    fn mark_persisted(&mut self, record: &CompletedSession) {
        self.completed_at.get_or_insert(record.completed_at());
        self.complete();
        self.persisted = Some(record.history_id());
        self.final_score = Some(record.score());
        tracing::info!(
            history_id = %record.history_id(),
            percentage = record.score().percentage,
            "session submitted"
        );
    }

    //
    // ─── READ SIDE ────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let total = self.navigation.len();
        let timer = self.timer.state();
        SessionSnapshot {
            lifecycle: self.lifecycle,
            session_id: self
                .active
                .as_ref()
                .map(|a| a.session_id)
                .or(self.loading_id),
            test_kind: self.active.as_ref().map(|a| a.kind),
            level: self.active.as_ref().map(|a| a.topic.level),
            topic: self.active.as_ref().map(|a| a.topic.clone()),
            timer,
            remaining_secs: timer.remaining(),
            current_index: self.navigation.current_index(),
            current_question: self.navigation.current_question().cloned(),
            progress: self.navigation.progress(),
            statuses: self.navigation.statuses(),
            answered_count: self.navigation.answered_count(),
            unanswered_count: self.navigation.unanswered_count(),
            reviewed_count: self.navigation.reviewed_count(),
            answered_percentage: self.navigation.progress_percentage(),
            is_last_question: self.navigation.is_last_question(),
            presentation: self.presentation.state(),
            tally: self.scoring.tally(),
            score_percentage: self.scoring.calculate_score(total),
            submission: self.scoring.submission(),
            can_submit: Scoring::can_submit_test(total, self.navigation.answered_count()),
            history_id: self.persisted,
            final_score: self.final_score,
        }
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    #[must_use]
    pub fn session_id(&self) -> Option<TestId> {
        self.active.as_ref().map(|a| a.session_id).or(self.loading_id)
    }

    #[must_use]
    pub fn history_id(&self) -> Option<HistoryId> {
        self.persisted
    }

    /// Completed but not yet written to history.
    #[must_use]
    pub fn needs_finalize(&self) -> bool {
        self.lifecycle == Lifecycle::Completed && self.persisted.is_none()
    }

    #[must_use]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    #[must_use]
    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    #[must_use]
    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    #[must_use]
    pub fn scoring(&self) -> &Scoring {
        &self.scoring
    }
}
