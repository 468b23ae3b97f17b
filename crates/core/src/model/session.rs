use thiserror::Error;

use crate::model::ids::SessionId;

/// Longest nickname accepted locally, in characters.
pub const MAX_NICKNAME_CHARS: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NicknameError {
    #[error("a nickname is required to appear in the leaderboard")]
    RequiredForLeaderboard,

    #[error("nickname is too long: {len} characters (max {MAX_NICKNAME_CHARS})")]
    TooLong { len: usize },
}

/// Raw nickname/visibility input collected before a session exists.
#[derive(Clone, Debug, Default)]
pub struct SessionDraft {
    pub nickname: String,
    pub show_in_leaderboard: bool,
}

/// Validated request for a new session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRequest {
    /// `None` asks the service for a guest name.
    pub nickname: Option<String>,
    pub show_in_leaderboard: bool,
}

impl SessionDraft {
    #[must_use]
    pub fn new(nickname: impl Into<String>, show_in_leaderboard: bool) -> Self {
        Self {
            nickname: nickname.into(),
            show_in_leaderboard,
        }
    }

    /// Normalize the nickname and check the visibility precondition.
    ///
    /// # Errors
    ///
    /// Returns `NicknameError::RequiredForLeaderboard` when visibility is requested
    /// without a nickname, or `NicknameError::TooLong` for oversized input.
    pub fn validate(self) -> Result<SessionRequest, NicknameError> {
        let nickname = normalize_nickname(&self.nickname);
        let len = nickname.as_deref().map_or(0, |n| n.chars().count());
        if len > MAX_NICKNAME_CHARS {
            return Err(NicknameError::TooLong { len });
        }
        if self.show_in_leaderboard && nickname.is_none() {
            return Err(NicknameError::RequiredForLeaderboard);
        }
        Ok(SessionRequest {
            nickname,
            show_in_leaderboard: self.show_in_leaderboard,
        })
    }
}

/// Identity of the current attempt, issued once by the remote service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionProfile {
    nickname: String,
    session_id: SessionId,
    show_in_leaderboard: bool,
}

impl SessionProfile {
    #[must_use]
    pub fn new(
        nickname: impl Into<String>,
        session_id: SessionId,
        show_in_leaderboard: bool,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            session_id,
            show_in_leaderboard,
        }
    }

    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn show_in_leaderboard(&self) -> bool {
        self.show_in_leaderboard
    }
}

/// Trim and collapse whitespace runs; `None` when nothing is left.
#[must_use]
pub fn normalize_nickname(raw: &str) -> Option<String> {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}
