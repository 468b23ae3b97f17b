//! Scripted in-process `QuizService` for tests and offline play.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::StatusCode;

use quiz_core::model::{
    LeaderboardEntry, Question, QuestionId, QuizId, QuizMetadata, SessionId, SessionProfile,
    SessionRequest, clamp_leaderboard_limit,
};

use super::{
    FinalFeedback, FinalFeedbackRequest, GradeRequest, GradeResponse, QuizService, ServerProgress,
};
use crate::error::ServiceError;

/// Remote operations the fake can count and fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    Health,
    Metadata,
    Questions,
    StartSession,
    Grade,
    FinalFeedback,
    Leaderboard,
}

/// How the fake grades answers to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeRule {
    Fixed { ok: bool, feedback: String },
    /// Correct when the answer contains the keyword, ignoring case.
    Keyword(String),
}

impl GradeRule {
    #[must_use]
    pub fn fixed(ok: bool, feedback: impl Into<String>) -> Self {
        Self::Fixed {
            ok,
            feedback: feedback.into(),
        }
    }

    fn apply(&self, answer: &str) -> (bool, String) {
        match self {
            Self::Fixed { ok, feedback } => (*ok, feedback.clone()),
            Self::Keyword(keyword) => {
                if answer.to_lowercase().contains(&keyword.to_lowercase()) {
                    (true, "Correct.".to_owned())
                } else {
                    (false, format!("Not quite. Think about \"{keyword}\"."))
                }
            }
        }
    }
}

impl Default for GradeRule {
    fn default() -> Self {
        Self::fixed(true, "Correct.")
    }
}

#[derive(Debug, Default)]
struct FakeState {
    pass_score: u32,
    questions: Vec<Question>,
    rules: HashMap<QuestionId, GradeRule>,
    default_rule: GradeRule,
    final_feedback: Option<FinalFeedback>,
    leaderboard: Vec<LeaderboardEntry>,
    failing: HashSet<FakeOp>,
    calls: HashMap<FakeOp, usize>,
    sessions_issued: u32,
    verdicts: HashMap<(SessionId, QuestionId), bool>,
    last_grade: Option<GradeRequest>,
    last_final_request: Option<FinalFeedbackRequest>,
}

impl FakeState {
    fn enter(&mut self, op: FakeOp) -> Result<(), ServiceError> {
        *self.calls.entry(op).or_default() += 1;
        if self.failing.contains(&op) {
            return Err(ServiceError::Unavailable(format!("{op:?} is scripted to fail")));
        }
        Ok(())
    }

    fn session_progress(&self, session_id: &SessionId) -> ServerProgress {
        let (answered, correct) = self
            .verdicts
            .iter()
            .filter(|((sid, _), _)| sid == session_id)
            .fold((0, 0), |(answered, correct), (_, ok)| {
                (answered + 1, correct + u32::from(*ok))
            });
        ServerProgress {
            correct,
            answered,
            total: count(self.questions.len()),
        }
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// In-process quiz service with scripted answers and injectable failures.
///
/// Every call is counted per [`FakeOp`], whether or not it fails.
#[derive(Debug, Default)]
pub struct FakeQuizService {
    state: Mutex<FakeState>,
}

impl FakeQuizService {
    #[must_use]
    pub fn new(pass_score: u32, questions: Vec<Question>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                pass_score,
                questions,
                ..FakeState::default()
            }),
        }
    }

    /// A small Rust quiz graded by keyword, used by the binary's offline mode.
    #[must_use]
    pub fn sample() -> Self {
        let items = [
            ("ownership", "Which keyword moves a closure's captures into it?", "move"),
            ("borrow", "How many mutable references to a value may exist at once?", "one"),
            ("errors", "Which operator propagates an error out of a function?", "?"),
        ];
        let mut rules = Vec::new();
        let questions = items
            .iter()
            .filter_map(|(id, prompt, keyword)| {
                let id = QuestionId::new(*id).ok()?;
                rules.push((id.clone(), GradeRule::Keyword((*keyword).to_owned())));
                Question::new(id, *prompt).ok()
            })
            .collect();

        let fake = Self::new(2, questions);
        for (id, rule) in rules {
            fake.set_rule(id, rule);
        }
        fake.set_leaderboard(vec![LeaderboardEntry {
            nickname: "ferris".into(),
            best_correct: 3,
            best_answered: 3,
            last_activity_at: "2026-01-01T00:00:00Z".into(),
            attempts: Some(1),
        }]);
        fake
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_rule(&self, question_id: QuestionId, rule: GradeRule) {
        self.state().rules.insert(question_id, rule);
    }

    /// Rule for questions without a rule of their own.
    pub fn set_default_rule(&self, rule: GradeRule) {
        self.state().default_rule = rule;
    }

    /// Answer every final feedback request with this verdict.
    pub fn script_final_feedback(&self, feedback: FinalFeedback) {
        self.state().final_feedback = Some(feedback);
    }

    pub fn set_leaderboard(&self, entries: Vec<LeaderboardEntry>) {
        self.state().leaderboard = entries;
    }

    pub fn fail(&self, op: FakeOp) {
        self.state().failing.insert(op);
    }

    pub fn recover(&self, op: FakeOp) {
        self.state().failing.remove(&op);
    }

    #[must_use]
    pub fn calls(&self, op: FakeOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn last_grade(&self) -> Option<GradeRequest> {
        self.state().last_grade.clone()
    }

    #[must_use]
    pub fn last_final_request(&self) -> Option<FinalFeedbackRequest> {
        self.state().last_final_request.clone()
    }
}

#[async_trait]
impl QuizService for FakeQuizService {
    async fn health(&self) -> Result<(), ServiceError> {
        self.state().enter(FakeOp::Health)
    }

    async fn fetch_metadata(&self, _quiz_id: &QuizId) -> Result<QuizMetadata, ServiceError> {
        let mut state = self.state();
        state.enter(FakeOp::Metadata)?;
        Ok(QuizMetadata {
            pass_score: state.pass_score,
        })
    }

    async fn fetch_questions(&self, _quiz_id: &QuizId) -> Result<Vec<Question>, ServiceError> {
        let mut state = self.state();
        state.enter(FakeOp::Questions)?;
        Ok(state.questions.clone())
    }

    async fn start_session(
        &self,
        _quiz_id: &QuizId,
        request: &SessionRequest,
    ) -> Result<SessionProfile, ServiceError> {
        let mut state = self.state();
        state.enter(FakeOp::StartSession)?;
        state.sessions_issued += 1;
        let serial = state.sessions_issued;

        let session_id = SessionId::new(format!("fake-session-{serial}"))
            .map_err(|err| ServiceError::Protocol(err.to_string()))?;
        let visible = request.show_in_leaderboard && request.nickname.is_some();
        let nickname = request
            .nickname
            .clone()
            .unwrap_or_else(|| format!("Guest-{serial}"));
        Ok(SessionProfile::new(nickname, session_id, visible))
    }

    async fn grade(&self, request: &GradeRequest) -> Result<GradeResponse, ServiceError> {
        let mut state = self.state();
        state.enter(FakeOp::Grade)?;
        if !state
            .questions
            .iter()
            .any(|question| question.id() == &request.question_id)
        {
            return Err(ServiceError::Status {
                status: StatusCode::NOT_FOUND,
                detail: "Question not found".into(),
            });
        }

        let rule = state
            .rules
            .get(&request.question_id)
            .unwrap_or(&state.default_rule);
        let (ok, feedback) = rule.apply(&request.answer);
        state.verdicts.insert(
            (request.session_id.clone(), request.question_id.clone()),
            ok,
        );
        state.last_grade = Some(request.clone());

        Ok(GradeResponse {
            ok,
            feedback,
            progress: Some(state.session_progress(&request.session_id)),
        })
    }

    async fn final_feedback(
        &self,
        request: &FinalFeedbackRequest,
    ) -> Result<FinalFeedback, ServiceError> {
        let mut state = self.state();
        state.enter(FakeOp::FinalFeedback)?;
        state.last_final_request = Some(request.clone());

        if let Some(scripted) = &state.final_feedback {
            return Ok(scripted.clone());
        }
        let progress = request.progress;
        Ok(FinalFeedback {
            passed: progress.correct >= state.pass_score,
            message: format!(
                "You answered {} of {} correctly.",
                progress.correct, progress.total
            ),
        })
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let mut state = self.state();
        state.enter(FakeOp::Leaderboard)?;
        let limit = usize::try_from(clamp_leaderboard_limit(limit)).unwrap_or(usize::MAX);
        Ok(state.leaderboard.iter().take(limit).cloned().collect())
    }
}
