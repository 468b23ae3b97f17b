use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{
    Direction, LeaderboardEntry, Question, QuestionId, QuizId, QuizIdentity, QuizMetadata,
    SessionProfile, SessionRequest,
};
use services::{
    ControllerError, ControllerPhase, FakeOp, FakeQuizService, FinalFeedback,
    FinalFeedbackRequest, FinalizeOutcome, GradeRequest, GradeResponse, GradeRule, LedgerError,
    QuizService, QuizSessionController, ServiceError, SessionError, SkipReason, ValidationError,
    VerdictSource,
};
use storage::{InMemoryStore, KeyValueStore, QuizStateStore, StateKey, StorageError};

fn qid(raw: &str) -> QuestionId {
    QuestionId::new(raw).unwrap()
}

fn questions(ids: &[&str]) -> Vec<Question> {
    ids.iter()
        .map(|id| Question::new(qid(id), format!("Question {id}?")).unwrap())
        .collect()
}

/// Two questions, pass threshold 1; `q1` is graded correct and `q2` wrong.
fn two_question_quiz() -> Arc<FakeQuizService> {
    let fake = FakeQuizService::new(1, questions(&["q1", "q2"]));
    fake.set_rule(qid("q1"), GradeRule::fixed(true, "Right."));
    fake.set_rule(qid("q2"), GradeRule::fixed(false, "Nope."));
    fake.script_final_feedback(FinalFeedback {
        passed: true,
        message: "You passed.".into(),
    });
    Arc::new(fake)
}

fn quiz_on(fake: &Arc<FakeQuizService>, kv: &InMemoryStore) -> QuizSessionController {
    QuizSessionController::new(QuizIdentity::default(), Arc::new(kv.clone()), fake.clone())
}

async fn loaded_with_session(
    fake: &Arc<FakeQuizService>,
    kv: &InMemoryStore,
) -> QuizSessionController {
    let mut quiz = quiz_on(fake, kv);
    quiz.load(QuizIdentity::default()).await.unwrap();
    quiz.start_session("neo", true).await.unwrap();
    quiz
}

async fn answer_all(quiz: &mut QuizSessionController) {
    quiz.submit_answer("ownership").await.unwrap();
    quiz.navigate(Direction::Next).await.unwrap();
    quiz.submit_answer("borrowing").await.unwrap();
}

#[tokio::test]
async fn two_question_attempt_finalizes_once() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let mut quiz = loaded_with_session(&fake, &kv).await;

    let graded = quiz.submit_answer("ownership").await.unwrap();
    assert!(graded.correct);
    assert_eq!(graded.stats.answered, 1);

    let early = quiz.finalize(false).await.unwrap();
    assert_eq!(
        early,
        FinalizeOutcome::Skipped(SkipReason::Incomplete {
            answered: 1,
            total: 2
        })
    );
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 0);

    quiz.navigate(Direction::Next).await.unwrap();
    let graded = quiz.submit_answer("borrowing").await.unwrap();
    assert!(!graded.correct);

    let first = quiz.finalize(false).await.unwrap();
    let result = first.result().unwrap();
    assert_eq!(result.source, VerdictSource::Remote);
    assert!(result.verdict.passed);
    assert_eq!(result.verdict.correct(), 1);
    assert_eq!(result.verdict.total(), 2);
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 1);

    let sent = fake.last_final_request().unwrap();
    assert_eq!(sent.progress, result.verdict.progress);
    assert_eq!(&sent.session_id, quiz.profile().unwrap().session_id());

    let second = quiz.finalize(false).await.unwrap();
    let repeat = second.result().unwrap();
    assert_eq!(repeat.source, VerdictSource::Cached);
    assert_eq!(repeat.verdict, result.verdict);
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 1);
}

#[tokio::test]
async fn any_new_answer_invalidates_the_cached_verdict() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let mut quiz = loaded_with_session(&fake, &kv).await;
    answer_all(&mut quiz).await;
    quiz.finalize(false).await.unwrap();
    let before = quiz.stats().triple();

    // Same verdict for q1, so the progress triple does not change.
    quiz.navigate(Direction::Previous).await.unwrap();
    quiz.submit_answer("ownership, again").await.unwrap();
    assert_eq!(quiz.stats().triple(), before);
    assert!(quiz.displayed_verdict().is_none());

    let outcome = quiz.finalize(false).await.unwrap();
    assert_eq!(outcome.result().unwrap().source, VerdictSource::Remote);
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 2);
}

#[tokio::test]
async fn forced_finish_runs_at_any_completion_level() {
    let fake = two_question_quiz();
    let mut quiz = loaded_with_session(&fake, &InMemoryStore::new()).await;

    let passive = quiz.finalize(false).await.unwrap();
    assert!(matches!(passive, FinalizeOutcome::Skipped(_)));
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 0);

    let forced = quiz.finalize(true).await.unwrap();
    assert_eq!(forced.result().unwrap().verdict.answered(), 0);
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 1);
}

#[tokio::test]
async fn empty_quiz_never_finalizes() {
    let fake = Arc::new(FakeQuizService::new(1, Vec::new()));
    let mut quiz = quiz_on(&fake, &InMemoryStore::new());
    quiz.load(QuizIdentity::default()).await.unwrap();

    assert_eq!(
        quiz.finalize(true).await.unwrap(),
        FinalizeOutcome::Skipped(SkipReason::NoQuestions)
    );
    assert_eq!(quiz.navigate(Direction::Next).await.unwrap(), None);
    assert_eq!(quiz.current_index(), None);
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 0);
}

#[tokio::test]
async fn submissions_are_validated_before_any_remote_call() {
    let fake = two_question_quiz();
    let mut quiz = quiz_on(&fake, &InMemoryStore::new());
    quiz.load(QuizIdentity::default()).await.unwrap();

    let err = quiz.submit_answer("ownership").await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Validation(ValidationError::NoSession)
    ));

    quiz.start_session("", false).await.unwrap();
    let err = quiz.submit_answer(" \t ").await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Validation(ValidationError::EmptyAnswer)
    ));
    assert_eq!(fake.calls(FakeOp::Grade), 0);
    assert!(quiz.ledger().is_empty());
}

#[tokio::test]
async fn visibility_requires_a_nickname() {
    let fake = two_question_quiz();
    let mut quiz = quiz_on(&fake, &InMemoryStore::new());
    quiz.load(QuizIdentity::default()).await.unwrap();

    let err = quiz.start_session("   ", true).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(fake.calls(FakeOp::StartSession), 0);
    assert!(quiz.input_enabled());
}

#[tokio::test]
async fn corrupt_storage_loads_as_a_fresh_attempt() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let state = QuizStateStore::new(Arc::new(kv.clone()), &QuizIdentity::default());
    kv.set(&state.key(StateKey::NavIndex), "{}").await.unwrap();
    kv.set(&state.key(StateKey::Progress), "not json").await.unwrap();
    kv.set(&state.key(StateKey::FinalVerdict), "[1, 2]").await.unwrap();
    kv.set(&state.key(StateKey::Session), r#"{"nickname": "neo"}"#)
        .await
        .unwrap();

    let mut quiz = quiz_on(&fake, &kv);
    let summary = quiz.load(QuizIdentity::default()).await.unwrap();
    assert_eq!(summary.nav_index, Some(0));
    assert_eq!(summary.stats.answered, 0);
    assert!(!summary.restored_session);
    assert!(!summary.cached_verdict);

    kv.set(&state.key(StateKey::Progress), r#"{"other": 1}"#)
        .await
        .unwrap();
    quiz.reload().await.unwrap();
    assert!(quiz.ledger().is_empty());
}

#[tokio::test]
async fn navigation_stays_in_range_and_persists() {
    let fake = Arc::new(FakeQuizService::new(1, questions(&["a", "b", "c"])));
    let kv = InMemoryStore::new();
    let state = QuizStateStore::new(Arc::new(kv.clone()), &QuizIdentity::default());
    state.save_nav_index(9).await.unwrap();

    let mut quiz = quiz_on(&fake, &kv);
    let summary = quiz.load(QuizIdentity::default()).await.unwrap();
    assert_eq!(summary.nav_index, Some(2));
    assert_eq!(state.load_nav_index().await, 2);

    let steps = [
        Direction::Next,
        Direction::Next,
        Direction::Previous,
        Direction::Previous,
        Direction::Previous,
        Direction::Previous,
        Direction::Next,
    ];
    for step in steps {
        let index = quiz.navigate(step).await.unwrap().unwrap();
        assert!(index < 3);
    }
    assert_eq!(quiz.current_index(), Some(1));
    assert_eq!(state.load_nav_index().await, 1);
    assert_eq!(fake.calls(FakeOp::Grade), 0);
}

#[tokio::test]
async fn fallback_verdict_is_shown_but_not_cached() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let mut quiz = loaded_with_session(&fake, &kv).await;
    answer_all(&mut quiz).await;

    fake.fail(FakeOp::FinalFeedback);
    let fallback = quiz.finalize(false).await.unwrap();
    let result = fallback.result().unwrap();
    assert_eq!(result.source, VerdictSource::Fallback);
    assert!(result.verdict.passed);
    assert!(quiz.input_enabled());

    let state = QuizStateStore::new(Arc::new(kv.clone()), &QuizIdentity::default());
    assert!(state.load_verdict().await.is_none());

    fake.recover(FakeOp::FinalFeedback);
    let remote = quiz.finalize(false).await.unwrap();
    assert_eq!(remote.result().unwrap().source, VerdictSource::Remote);
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 2);
}

#[tokio::test]
async fn reload_shows_cached_verdict_without_a_remote_call() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let mut quiz = loaded_with_session(&fake, &kv).await;
    answer_all(&mut quiz).await;
    let original = quiz.finalize(false).await.unwrap();

    let mut reopened = quiz_on(&fake, &kv);
    let summary = reopened.load(QuizIdentity::default()).await.unwrap();
    assert!(summary.restored_session);
    assert!(summary.cached_verdict);
    assert_eq!(summary.nav_index, Some(1));

    let shown = reopened.displayed_verdict().unwrap();
    assert_eq!(shown.source, VerdictSource::Cached);
    assert_eq!(Some(&shown.verdict), original.result().map(|r| &r.verdict));

    reopened.finalize(false).await.unwrap();
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 1);
}

#[tokio::test]
async fn quiz_identities_keep_separate_state() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let mut quiz = loaded_with_session(&fake, &kv).await;
    quiz.submit_answer("ownership").await.unwrap();
    let first_session = quiz.profile().unwrap().clone();

    let other = QuizIdentity::new(QuizId::new("quiz2"), "default");
    let summary = quiz.load(other).await.unwrap();
    assert!(!summary.restored_session);
    assert!(quiz.ledger().is_empty());
    assert!(quiz.profile().is_none());

    quiz.start_session("neo", true).await.unwrap();
    assert_ne!(quiz.profile().unwrap().session_id(), first_session.session_id());

    quiz.load(QuizIdentity::default()).await.unwrap();
    assert_eq!(quiz.profile(), Some(&first_session));
    assert!(quiz.ledger().get(&qid("q1")).is_some());
}

#[tokio::test]
async fn reset_progress_keeps_the_session() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let mut quiz = loaded_with_session(&fake, &kv).await;
    answer_all(&mut quiz).await;
    quiz.finalize(false).await.unwrap();

    quiz.reset_progress().await.unwrap();
    assert!(quiz.ledger().is_empty());
    assert_eq!(quiz.current_index(), Some(0));
    assert_eq!(quiz.draft(), "");
    assert!(quiz.displayed_verdict().is_none());
    assert!(quiz.profile().is_some());

    let mut reopened = quiz_on(&fake, &kv);
    let summary = reopened.load(QuizIdentity::default()).await.unwrap();
    assert_eq!(summary.stats.answered, 0);
    assert_eq!(summary.nav_index, Some(0));
    assert!(summary.restored_session);
}

/// Delegates to the fake, except that grading never answers.
struct StalledGrader(Arc<FakeQuizService>);

#[async_trait]
impl QuizService for StalledGrader {
    async fn health(&self) -> Result<(), ServiceError> {
        self.0.health().await
    }

    async fn fetch_metadata(&self, quiz_id: &QuizId) -> Result<QuizMetadata, ServiceError> {
        self.0.fetch_metadata(quiz_id).await
    }

    async fn fetch_questions(&self, quiz_id: &QuizId) -> Result<Vec<Question>, ServiceError> {
        self.0.fetch_questions(quiz_id).await
    }

    async fn start_session(
        &self,
        quiz_id: &QuizId,
        request: &SessionRequest,
    ) -> Result<SessionProfile, ServiceError> {
        self.0.start_session(quiz_id, request).await
    }

    async fn grade(&self, _request: &GradeRequest) -> Result<GradeResponse, ServiceError> {
        std::future::pending().await
    }

    async fn final_feedback(
        &self,
        request: &FinalFeedbackRequest,
    ) -> Result<FinalFeedback, ServiceError> {
        self.0.final_feedback(request).await
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        self.0.leaderboard(limit).await
    }
}

#[tokio::test]
async fn abandoned_submission_leaves_the_controller_usable() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let mut quiz = QuizSessionController::new(
        QuizIdentity::default(),
        Arc::new(kv.clone()),
        Arc::new(StalledGrader(fake.clone())),
    );
    quiz.load(QuizIdentity::default()).await.unwrap();
    quiz.start_session("neo", false).await.unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), quiz.submit_answer("ownership")).await;
    assert!(abandoned.is_err());

    assert_eq!(quiz.phase(), ControllerPhase::Ready);
    assert!(quiz.ledger().is_empty());
    assert_eq!(quiz.draft(), "ownership");
    assert_eq!(quiz.navigate(Direction::Next).await.unwrap(), Some(1));
    quiz.reload().await.unwrap();
    quiz.reset_progress().await.unwrap();
}

#[tokio::test]
async fn new_session_gets_its_own_final_verdict() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let mut quiz = loaded_with_session(&fake, &kv).await;
    answer_all(&mut quiz).await;
    quiz.finalize(false).await.unwrap();
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 1);

    quiz.reset_session().await.unwrap();
    assert!(quiz.displayed_verdict().is_none());
    let state = QuizStateStore::new(Arc::new(kv.clone()), &QuizIdentity::default());
    assert!(state.load_verdict().await.is_none());
    assert_eq!(quiz.stats().answered, 2);

    let profile = quiz.start_session("trin", false).await.unwrap();
    let outcome = quiz.finalize(false).await.unwrap();
    assert_eq!(outcome.result().unwrap().source, VerdictSource::Remote);
    assert_eq!(fake.calls(FakeOp::FinalFeedback), 2);
    assert_eq!(
        fake.last_final_request().unwrap().session_id,
        *profile.session_id()
    );
}

#[tokio::test]
async fn separators_in_scope_and_quiz_id_do_not_alias() {
    let fake = two_question_quiz();
    let kv = InMemoryStore::new();
    let first = QuizIdentity::new(QuizId::new("c"), "a:b");
    let second = QuizIdentity::new(QuizId::new("b:c"), "a");

    let mut quiz = QuizSessionController::new(first.clone(), Arc::new(kv.clone()), fake.clone());
    quiz.load(first).await.unwrap();
    quiz.start_session("neo", true).await.unwrap();
    quiz.submit_answer("ownership").await.unwrap();

    let mut other = QuizSessionController::new(second.clone(), Arc::new(kv.clone()), fake.clone());
    let summary = other.load(second).await.unwrap();
    assert!(!summary.restored_session);
    assert_eq!(summary.stats.answered, 0);
}

/// In-memory store that rejects writes to keys ending in a chosen suffix.
#[derive(Clone, Default)]
struct PartlyReadOnlyStore {
    inner: InMemoryStore,
    blocked_suffix: Arc<Mutex<Option<String>>>,
}

impl PartlyReadOnlyStore {
    fn block_writes_to(&self, suffix: &str) {
        *self.blocked_suffix.lock().unwrap() = Some(suffix.to_owned());
    }

    fn check(&self, key: &str) -> Result<(), StorageError> {
        match self.blocked_suffix.lock().unwrap().as_deref() {
            Some(suffix) if key.ends_with(suffix) => {
                Err(StorageError::Connection(format!("{key} is read-only")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KeyValueStore for PartlyReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check(key)?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check(key)?;
        self.inner.remove(key).await
    }
}

fn quiz_over(fake: &Arc<FakeQuizService>, store: &PartlyReadOnlyStore) -> QuizSessionController {
    QuizSessionController::new(QuizIdentity::default(), Arc::new(store.clone()), fake.clone())
}

#[tokio::test]
async fn failed_progress_write_keeps_previous_answer() {
    let fake = two_question_quiz();
    let store = PartlyReadOnlyStore::default();
    let mut quiz = quiz_over(&fake, &store);
    quiz.load(QuizIdentity::default()).await.unwrap();
    quiz.start_session("neo", false).await.unwrap();
    quiz.submit_answer("ownership").await.unwrap();

    store.block_writes_to(":progress");
    let err = quiz.submit_answer("lifetimes").await.unwrap_err();
    assert!(matches!(err, ControllerError::Ledger(LedgerError::Storage(_))));
    assert_eq!(quiz.phase(), ControllerPhase::Ready);
    assert_eq!(quiz.draft(), "lifetimes");
    assert_eq!(quiz.current_answer().unwrap().raw_answer, "ownership");

    let state = QuizStateStore::new(Arc::new(store.inner.clone()), &QuizIdentity::default());
    let persisted = state.load_ledger().await;
    assert_eq!(persisted.get(&qid("q1")).unwrap().raw_answer, "ownership");
    assert_eq!(fake.last_grade().unwrap().answer, "lifetimes");
}

#[tokio::test]
async fn failed_profile_write_adopts_no_session() {
    let fake = two_question_quiz();
    let store = PartlyReadOnlyStore::default();
    let mut quiz = quiz_over(&fake, &store);
    quiz.load(QuizIdentity::default()).await.unwrap();

    store.block_writes_to(":session");
    let err = quiz.start_session("neo", true).await.unwrap_err();
    assert!(matches!(err, ControllerError::Session(SessionError::Storage(_))));
    assert!(quiz.profile().is_none());
    assert_eq!(fake.calls(FakeOp::StartSession), 1);
    assert!(matches!(
        quiz.submit_answer("ownership").await,
        Err(ControllerError::Validation(ValidationError::NoSession))
    ));
}

#[tokio::test]
async fn partial_reset_never_shows_cleared_answers() {
    let fake = two_question_quiz();
    let store = PartlyReadOnlyStore::default();
    let mut quiz = quiz_over(&fake, &store);
    quiz.load(QuizIdentity::default()).await.unwrap();
    quiz.start_session("neo", false).await.unwrap();
    quiz.submit_answer("ownership").await.unwrap();

    store.block_writes_to(":nav_index");
    let err = quiz.reset_progress().await.unwrap_err();
    assert!(matches!(err, ControllerError::Ledger(_)));
    assert!(quiz.ledger().is_empty());
    assert_eq!(quiz.draft(), "");

    let state = QuizStateStore::new(Arc::new(store.inner.clone()), &QuizIdentity::default());
    assert!(state.load_ledger().await.is_empty());
}
