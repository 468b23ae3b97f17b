//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::NicknameError;
use storage::StorageError;

use crate::quiz::ControllerPhase;

/// Errors emitted while building client configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid value for {name}: {raw}")]
    InvalidValue { name: &'static str, raw: String },
}

/// Errors emitted by a `QuizService` implementation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("quiz service returned {status}: {detail}")]
    Status {
        status: reqwest::StatusCode,
        detail: String,
    },
    #[error("unexpected response from quiz service: {0}")]
    Protocol(String),
    #[error("quiz service unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `IdentityService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Nickname(#[from] NicknameError),
    #[error("could not create session: {0}")]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LedgerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Local validation failures; nothing was sent and nothing changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("answer is empty")]
    EmptyAnswer,
    #[error("no active session; start one first")]
    NoSession,
    #[error("no question is selected")]
    NoQuestion,
    #[error(transparent)]
    Nickname(#[from] NicknameError),
}

/// Errors emitted by `QuizSessionController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("controller is not ready ({0})")]
    NotReady(ControllerPhase),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Session(SessionError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<SessionError> for ControllerError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Nickname(err) => Self::Validation(ValidationError::Nickname(err)),
            other => Self::Session(other),
        }
    }
}

impl ControllerError {
    /// True for failures detected before any remote call.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
