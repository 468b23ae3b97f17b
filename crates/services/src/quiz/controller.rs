use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use quiz_core::model::{
    AnswerRecord, Direction, FinalVerdict, NavigationIndex, ProgressLedger, ProgressStats,
    Question, QuestionId, QuizIdentity, SessionProfile,
};
use storage::{KeyValueStore, QuizStateStore};

use super::outcome::{
    ControllerPhase, FinalResult, FinalizeOutcome, GradeOutcome, LoadSummary, SkipReason,
    VerdictSource,
};
use crate::client::{FinalFeedbackRequest, GradeRequest, QuizService};
use crate::config::DEFAULT_PASS_SCORE;
use crate::error::{ControllerError, ValidationError};
use crate::identity::IdentityService;
use crate::ledger::LedgerService;

/// Drives one quiz attempt: loading, navigation, answer submission and
/// finalization against a remote quiz service and a local store.
///
/// Operations take `&mut self` and run one at a time. Every operation leaves
/// the controller re-enterable: remote and storage failures restore the
/// previous phase and keep prior state, and so does dropping an operation's
/// future before it completes.
pub struct QuizSessionController {
    service: Arc<dyn QuizService>,
    kv: Arc<dyn KeyValueStore>,
    identity: QuizIdentity,
    state: QuizStateStore,
    sessions: IdentityService,
    ledger: LedgerService,
    phase: ControllerPhase,
    questions: Vec<Question>,
    question_ids: Vec<QuestionId>,
    nav: NavigationIndex,
    pass_threshold: u32,
    draft: String,
    displayed: Option<FinalResult>,
}

impl QuizSessionController {
    #[must_use]
    pub fn new(
        identity: QuizIdentity,
        kv: Arc<dyn KeyValueStore>,
        service: Arc<dyn QuizService>,
    ) -> Self {
        let state = QuizStateStore::new(Arc::clone(&kv), &identity);
        let sessions = IdentityService::new(
            Arc::clone(&service),
            state.clone(),
            identity.quiz_id().clone(),
        );
        let ledger = LedgerService::new(state.clone());
        Self {
            service,
            kv,
            identity,
            state,
            sessions,
            ledger,
            phase: ControllerPhase::Uninitialized,
            questions: Vec::new(),
            question_ids: Vec::new(),
            nav: NavigationIndex::default(),
            pass_threshold: DEFAULT_PASS_SCORE,
            draft: String::new(),
            displayed: None,
        }
    }

    /// Threshold used until metadata has been fetched successfully.
    #[must_use]
    pub fn with_pass_threshold(mut self, pass_threshold: u32) -> Self {
        self.pass_threshold = pass_threshold;
        self
    }

    // ─── Accessors ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Navigation and answer editing are only possible while `Ready`.
    #[must_use]
    pub fn input_enabled(&self) -> bool {
        self.phase == ControllerPhase::Ready
    }

    #[must_use]
    pub fn identity(&self) -> &QuizIdentity {
        &self.identity
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn pass_threshold(&self) -> u32 {
        self.pass_threshold
    }

    /// `None` while the question list is empty.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        (!self.questions.is_empty()).then_some(self.nav.value())
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index()?)
    }

    /// Last graded answer to the current question.
    #[must_use]
    pub fn current_answer(&self) -> Option<&AnswerRecord> {
        self.ledger.get(self.current_question()?.id())
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    #[must_use]
    pub fn profile(&self) -> Option<&SessionProfile> {
        self.sessions.profile()
    }

    #[must_use]
    pub fn ledger(&self) -> &ProgressLedger {
        self.ledger.ledger()
    }

    #[must_use]
    pub fn stats(&self) -> ProgressStats {
        self.ledger.stats(&self.question_ids, self.pass_threshold)
    }

    /// Verdict currently on display, if any.
    #[must_use]
    pub fn displayed_verdict(&self) -> Option<&FinalResult> {
        self.displayed.as_ref()
    }

    fn ensure_ready(&self) -> Result<(), ControllerError> {
        if self.phase == ControllerPhase::Ready {
            Ok(())
        } else {
            Err(ControllerError::NotReady(self.phase))
        }
    }

    fn sync_draft(&mut self) {
        self.draft = self
            .current_answer()
            .map(|record| record.raw_answer.clone())
            .unwrap_or_default();
    }

    // ─── Loading ───────────────────────────────────────────────────────────────

    /// Fetch metadata and questions for `identity`, then restore its persisted
    /// progress, session and cached verdict.
    ///
    /// A metadata failure keeps the previous pass threshold. A question fetch
    /// failure aborts the load and leaves the previous state untouched.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NotReady` while another operation is running and
    /// `ControllerError::Service` if the questions cannot be fetched.
    pub async fn load(&mut self, identity: QuizIdentity) -> Result<LoadSummary, ControllerError> {
        if !matches!(
            self.phase,
            ControllerPhase::Uninitialized | ControllerPhase::Ready
        ) {
            return Err(ControllerError::NotReady(self.phase));
        }

        let previous = self.phase;
        let mut busy = BusyPhase::enter(self, ControllerPhase::Loading, previous);
        let result = busy.load_inner(identity).await;
        if result.is_ok() {
            busy.exit = ControllerPhase::Ready;
        }
        drop(busy);
        result
    }

    /// Load the current quiz identity again.
    ///
    /// # Errors
    ///
    /// See [`QuizSessionController::load`].
    pub async fn reload(&mut self) -> Result<LoadSummary, ControllerError> {
        self.load(self.identity.clone()).await
    }

    async fn load_inner(&mut self, identity: QuizIdentity) -> Result<LoadSummary, ControllerError> {
        let quiz_id = identity.quiz_id();
        let threshold = match self.service.fetch_metadata(quiz_id).await {
            Ok(meta) => Some(meta.pass_score),
            Err(err) => {
                tracing::warn!(
                    quiz_id = %quiz_id,
                    error = %err,
                    fallback = self.pass_threshold,
                    "Failed to fetch quiz metadata; keeping previous pass threshold"
                );
                None
            }
        };
        let questions = self.service.fetch_questions(quiz_id).await?;

        if identity != self.identity {
            tracing::debug!(from = %self.identity.key_prefix(), to = %identity.key_prefix(), "Switching quiz identity");
            self.state = QuizStateStore::new(Arc::clone(&self.kv), &identity);
            self.sessions
                .rescope(self.state.clone(), identity.quiz_id().clone());
            self.ledger.rescope(self.state.clone());
            self.identity = identity;
        }
        if let Some(threshold) = threshold {
            self.pass_threshold = threshold;
        }

        let restored_session = self.sessions.restore().await.is_some();
        self.ledger.restore().await;

        self.question_ids = questions.iter().map(|q| q.id().clone()).collect();
        self.questions = questions;
        let raw_index = self.state.load_nav_index().await;
        self.nav = NavigationIndex::clamped(raw_index, self.questions.len());
        if !self.questions.is_empty() && self.nav.value() != raw_index {
            self.persist_nav().await;
        }
        self.sync_draft();

        let stats = self.stats();
        self.displayed = self
            .ledger
            .cached_verdict()
            .filter(|verdict| stats.is_complete() && verdict.matches(&stats.triple()))
            .map(|verdict| FinalResult {
                verdict: verdict.clone(),
                source: VerdictSource::Cached,
            });

        tracing::info!(
            quiz_id = %self.identity.quiz_id(),
            questions = self.questions.len(),
            answered = stats.answered,
            total = stats.total,
            "Quiz loaded"
        );

        Ok(LoadSummary {
            question_count: self.questions.len(),
            nav_index: self.current_index(),
            stats,
            restored_session,
            threshold_fallback: threshold.is_none(),
            cached_verdict: self.displayed.is_some(),
        })
    }

    async fn persist_nav(&self) {
        if let Err(err) = self.state.save_nav_index(self.nav.value()).await {
            tracing::warn!(error = %err, "Failed to persist navigation index");
        }
    }

    // ─── Session ───────────────────────────────────────────────────────────────

    /// Ensure a session exists for the loaded quiz, creating one if needed.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Validation` when visibility is requested without
    /// a nickname, or `ControllerError::Session` when creation fails.
    pub async fn start_session(
        &mut self,
        nickname_input: &str,
        wants_visibility: bool,
    ) -> Result<SessionProfile, ControllerError> {
        self.ensure_ready()?;
        let mut busy =
            BusyPhase::enter(self, ControllerPhase::CreatingSession, ControllerPhase::Ready);
        let result = busy
            .sessions
            .ensure_session(nickname_input, wants_visibility)
            .await;
        drop(busy);
        Ok(result?)
    }

    /// Forget the session of the loaded quiz together with any verdict issued
    /// under it. Progress is kept.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Ledger` if the cached verdict cannot be cleared
    /// and `ControllerError::Session` if the stored profile cannot be removed.
    pub async fn reset_session(&mut self) -> Result<(), ControllerError> {
        self.ensure_ready()?;
        self.ledger.invalidate_verdict().await?;
        self.displayed = None;
        self.sessions.reset().await?;
        tracing::info!(quiz_id = %self.identity.quiz_id(), "Session reset");
        Ok(())
    }

    // ─── Navigation ────────────────────────────────────────────────────────────

    /// Move one question back or forward, clamped to the list.
    ///
    /// Returns the new index, or `None` when there are no questions. The draft
    /// is replaced with the prior answer to the new question.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NotReady` unless the controller is `Ready`.
    pub async fn navigate(&mut self, direction: Direction) -> Result<Option<usize>, ControllerError> {
        self.ensure_ready()?;
        if self.questions.is_empty() {
            return Ok(None);
        }

        let next = self.nav.step(direction, self.questions.len());
        if next != self.nav {
            self.nav = next;
            self.persist_nav().await;
            self.sync_draft();
        }
        Ok(Some(self.nav.value()))
    }

    // ─── Answering ─────────────────────────────────────────────────────────────

    /// Grade `raw_answer` for the current question and record the result.
    ///
    /// The text becomes the draft first, so it survives any failure.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Validation` for an empty answer, a missing
    /// question or a missing session (nothing is sent), `ControllerError::Service`
    /// when grading fails and `ControllerError::Ledger` when the result cannot
    /// be persisted. The ledger is unchanged on every error.
    pub async fn submit_answer(&mut self, raw_answer: &str) -> Result<GradeOutcome, ControllerError> {
        self.ensure_ready()?;
        self.draft = raw_answer.to_owned();

        let question_id = self
            .current_question()
            .map(|question| question.id().clone())
            .ok_or(ValidationError::NoQuestion)?;
        if raw_answer.trim().is_empty() {
            return Err(ValidationError::EmptyAnswer.into());
        }
        let session_id = self
            .sessions
            .profile()
            .map(|profile| profile.session_id().clone())
            .ok_or(ValidationError::NoSession)?;

        let request = GradeRequest {
            session_id,
            question_id,
            answer: raw_answer.to_owned(),
        };
        let mut busy =
            BusyPhase::enter(self, ControllerPhase::Submitting, ControllerPhase::Ready);
        let result = busy.grade(request).await;
        drop(busy);
        result
    }

    async fn grade(&mut self, request: GradeRequest) -> Result<GradeOutcome, ControllerError> {
        let response = self.service.grade(&request).await?;

        let record = AnswerRecord::new(
            request.question_id.clone(),
            request.answer,
            response.ok,
            response.feedback.clone(),
        );
        self.ledger.record_answer(record).await?;
        self.displayed = None;

        let stats = self.stats();
        tracing::info!(
            question_id = %request.question_id,
            ok = response.ok,
            answered = stats.answered,
            total = stats.total,
            "Answer graded"
        );
        if let Some(server) = response.progress {
            tracing::debug!(
                correct = server.correct,
                answered = server.answered,
                total = server.total,
                "Server progress"
            );
        }

        Ok(GradeOutcome {
            question_id: request.question_id,
            correct: response.ok,
            feedback: response.feedback,
            server_progress: response.progress,
            stats,
        })
    }

    // ─── Finalization ──────────────────────────────────────────────────────────

    /// Produce the final verdict for the current progress.
    ///
    /// Without `force` this only proceeds once every question is answered. A
    /// cached verdict for the same `(total, answered, correct)` is reused
    /// without a remote call. A remote failure, or a missing session, yields an
    /// unpersisted local fallback verdict.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NotReady` unless the controller is `Ready`.
    pub async fn finalize(&mut self, force: bool) -> Result<FinalizeOutcome, ControllerError> {
        self.ensure_ready()?;

        let stats = self.stats();
        if stats.total == 0 {
            return Ok(FinalizeOutcome::Skipped(SkipReason::NoQuestions));
        }
        if !force && !stats.is_complete() {
            return Ok(FinalizeOutcome::Skipped(SkipReason::Incomplete {
                answered: stats.answered,
                total: stats.total,
            }));
        }

        let triple = stats.triple();
        let cached = self
            .ledger
            .cached_verdict()
            .filter(|verdict| verdict.matches(&triple))
            .cloned();
        if let Some(cached) = cached {
            tracing::debug!(?triple, "Reusing cached final verdict");
            return Ok(self.display(cached, VerdictSource::Cached));
        }

        let Some(session_id) = self
            .sessions
            .profile()
            .map(|profile| profile.session_id().clone())
        else {
            tracing::warn!("No session; showing local final verdict");
            return Ok(self.display(FinalVerdict::fallback(&stats), VerdictSource::Fallback));
        };

        let busy =
            BusyPhase::enter(self, ControllerPhase::Finalizing, ControllerPhase::Ready);
        let remote = busy
            .service
            .final_feedback(&FinalFeedbackRequest {
                session_id,
                progress: triple,
            })
            .await;
        drop(busy);

        let outcome = match remote {
            Ok(feedback) => {
                let verdict = FinalVerdict::new(feedback.passed, feedback.message, triple);
                if let Err(err) = self.ledger.remember_verdict(verdict.clone()).await {
                    tracing::warn!(error = %err, "Failed to persist final verdict");
                }
                self.display(verdict, VerdictSource::Remote)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Final feedback failed; using local verdict");
                self.display(FinalVerdict::fallback(&stats), VerdictSource::Fallback)
            }
        };
        Ok(outcome)
    }

    fn display(&mut self, verdict: FinalVerdict, source: VerdictSource) -> FinalizeOutcome {
        let result = FinalResult { verdict, source };
        self.displayed = Some(result.clone());
        FinalizeOutcome::Finished(result)
    }

    // ─── Reset ─────────────────────────────────────────────────────────────────

    /// Clear answers, navigation and the cached verdict. The session is kept.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Ledger` if persisted progress cannot be cleared.
    pub async fn reset_progress(&mut self) -> Result<(), ControllerError> {
        self.ensure_ready()?;
        let result = self.ledger.reset().await;
        self.nav = NavigationIndex::default();
        self.displayed = None;
        self.sync_draft();
        result?;
        tracing::info!(quiz_id = %self.identity.quiz_id(), "Progress reset");
        Ok(())
    }
}

/// Holds the controller in a busy phase and applies `exit` when dropped,
/// whether the operation finished or its future was dropped mid-await.
struct BusyPhase<'a> {
    quiz: &'a mut QuizSessionController,
    exit: ControllerPhase,
}

impl<'a> BusyPhase<'a> {
    fn enter(
        quiz: &'a mut QuizSessionController,
        busy: ControllerPhase,
        exit: ControllerPhase,
    ) -> Self {
        quiz.phase = busy;
        Self { quiz, exit }
    }
}

impl Deref for BusyPhase<'_> {
    type Target = QuizSessionController;

    fn deref(&self) -> &Self::Target {
        &*self.quiz
    }
}

impl DerefMut for BusyPhase<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.quiz
    }
}

impl Drop for BusyPhase<'_> {
    fn drop(&mut self) {
        self.quiz.phase = self.exit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FakeOp, FakeQuizService, GradeRule};
    use quiz_core::model::QuizId;
    use storage::InMemoryStore;

    fn questions(ids: &[&str]) -> Vec<Question> {
        ids.iter()
            .map(|id| Question::new(QuestionId::new(*id).unwrap(), format!("prompt {id}")).unwrap())
            .collect()
    }

    fn controller(fake: &Arc<FakeQuizService>) -> QuizSessionController {
        QuizSessionController::new(
            QuizIdentity::default(),
            Arc::new(InMemoryStore::new()),
            fake.clone(),
        )
    }

    #[tokio::test]
    async fn operations_before_load_are_rejected() {
        let fake = Arc::new(FakeQuizService::new(1, questions(&["q1"])));
        let mut quiz = controller(&fake);

        assert!(matches!(
            quiz.navigate(Direction::Next).await,
            Err(ControllerError::NotReady(ControllerPhase::Uninitialized))
        ));
        assert!(matches!(
            quiz.finalize(true).await,
            Err(ControllerError::NotReady(_))
        ));
        assert!(!quiz.input_enabled());
    }

    #[tokio::test]
    async fn failed_question_fetch_keeps_previous_state() {
        let fake = Arc::new(FakeQuizService::new(1, questions(&["q1", "q2"])));
        let mut quiz = controller(&fake);
        quiz.load(QuizIdentity::default()).await.unwrap();

        fake.fail(FakeOp::Questions);
        let err = quiz
            .load(QuizIdentity::new(QuizId::new("quiz2"), "default"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::Service(_)));
        assert_eq!(quiz.phase(), ControllerPhase::Ready);
        assert_eq!(quiz.questions().len(), 2);
        assert_eq!(quiz.identity().quiz_id().as_str(), "quiz1");
    }

    #[tokio::test]
    async fn metadata_failure_keeps_threshold() {
        let fake = Arc::new(FakeQuizService::new(7, questions(&["q1"])));
        fake.fail(FakeOp::Metadata);
        let mut quiz = controller(&fake).with_pass_threshold(4);

        let summary = quiz.load(QuizIdentity::default()).await.unwrap();
        assert!(summary.threshold_fallback);
        assert_eq!(quiz.pass_threshold(), 4);

        fake.recover(FakeOp::Metadata);
        quiz.reload().await.unwrap();
        assert_eq!(quiz.pass_threshold(), 7);
    }

    #[tokio::test]
    async fn failed_grade_keeps_draft_and_ledger() {
        let fake = Arc::new(FakeQuizService::new(1, questions(&["q1"])));
        fake.set_default_rule(GradeRule::fixed(true, "nice"));
        let mut quiz = controller(&fake);
        quiz.load(QuizIdentity::default()).await.unwrap();
        quiz.start_session("neo", false).await.unwrap();

        fake.fail(FakeOp::Grade);
        let err = quiz.submit_answer("my answer").await.unwrap_err();
        assert!(matches!(err, ControllerError::Service(_)));
        assert_eq!(quiz.draft(), "my answer");
        assert!(quiz.ledger().is_empty());
        assert!(quiz.input_enabled());
    }

    #[tokio::test]
    async fn navigation_restores_prior_answer_into_draft() {
        let fake = Arc::new(FakeQuizService::new(1, questions(&["q1", "q2"])));
        let mut quiz = controller(&fake);
        quiz.load(QuizIdentity::default()).await.unwrap();
        quiz.start_session("", false).await.unwrap();

        quiz.submit_answer("first").await.unwrap();
        quiz.navigate(Direction::Next).await.unwrap();
        assert_eq!(quiz.draft(), "");
        quiz.set_draft("half typed");
        quiz.navigate(Direction::Previous).await.unwrap();
        assert_eq!(quiz.draft(), "first");
    }
}
