#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod leaderboard;
pub mod ledger;
pub mod quiz;

pub use client::{
    FakeOp, FakeQuizService, FinalFeedback, FinalFeedbackRequest, GradeRequest, GradeResponse,
    GradeRule, HttpQuizService, QuizService, ServerProgress, flatten_detail,
};
pub use config::ServiceConfig;
pub use error::{
    ConfigError, ControllerError, LedgerError, ServiceError, SessionError, ValidationError,
};
pub use identity::IdentityService;
pub use leaderboard::{LeaderboardState, LeaderboardView};
pub use ledger::LedgerService;
pub use quiz::{
    ControllerPhase, FinalResult, FinalizeOutcome, GradeOutcome, LoadSummary, QuizSessionController,
    SkipReason, VerdictSource,
};
