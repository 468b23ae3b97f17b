//! Remote quiz service: metadata, questions, sessions, grading, final
//! feedback and the leaderboard.

mod detail;
pub mod fake;
mod http;
mod wire;

use async_trait::async_trait;

use quiz_core::model::{
    LeaderboardEntry, ProgressTriple, Question, QuestionId, QuizId, QuizMetadata, SessionId,
    SessionProfile, SessionRequest,
};

use crate::error::ServiceError;

pub use detail::flatten_detail;
pub use fake::{FakeOp, FakeQuizService, GradeRule};
pub use http::HttpQuizService;

/// One answer to be graded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeRequest {
    pub session_id: SessionId,
    pub question_id: QuestionId,
    pub answer: String,
}

/// Session counters the service may echo back after grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerProgress {
    pub correct: u32,
    pub answered: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeResponse {
    pub ok: bool,
    pub feedback: String,
    pub progress: Option<ServerProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalFeedbackRequest {
    pub session_id: SessionId,
    pub progress: ProgressTriple,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalFeedback {
    pub passed: bool,
    pub message: String,
}

/// Typed request/response contract of the remote quiz service.
///
/// Each call is a single round trip with no retry.
#[async_trait]
pub trait QuizService: Send + Sync {
    /// # Errors
    ///
    /// Returns `ServiceError` if the service is unreachable or unhealthy.
    async fn health(&self) -> Result<(), ServiceError>;

    /// # Errors
    ///
    /// Returns `ServiceError` for transport, status or shape failures.
    async fn fetch_metadata(&self, quiz_id: &QuizId) -> Result<QuizMetadata, ServiceError>;

    /// Ordered question set of a quiz.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` for transport, status or shape failures.
    async fn fetch_questions(&self, quiz_id: &QuizId) -> Result<Vec<Question>, ServiceError>;

    /// # Errors
    ///
    /// Returns `ServiceError` for transport or status failures, or
    /// `ServiceError::Protocol` when the response carries no session id.
    async fn start_session(
        &self,
        quiz_id: &QuizId,
        request: &SessionRequest,
    ) -> Result<SessionProfile, ServiceError>;

    /// # Errors
    ///
    /// Returns `ServiceError` for transport, status or shape failures.
    async fn grade(&self, request: &GradeRequest) -> Result<GradeResponse, ServiceError>;

    /// # Errors
    ///
    /// Returns `ServiceError` for transport, status or shape failures.
    async fn final_feedback(
        &self,
        request: &FinalFeedbackRequest,
    ) -> Result<FinalFeedback, ServiceError>;

    /// Ranked entries in service order; `limit` is clamped to the served range.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` for transport, status or shape failures.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, ServiceError>;
}
