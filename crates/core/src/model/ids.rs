use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quiz selector used when none is configured.
pub const DEFAULT_QUIZ_ID: &str = "quiz1";

/// Identifier of a quiz on the remote service.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(String);

impl QuizId {
    /// Creates a `QuizId`, falling back to [`DEFAULT_QUIZ_ID`] for blank input.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::default()
        } else {
            Self(trimmed.to_owned())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QuizId {
    fn default() -> Self {
        Self(DEFAULT_QUIZ_ID.to_owned())
    }
}

/// Opaque identifier of a question, unique within one quiz.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    /// Creates a `QuestionId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the id is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(IdError::Empty { kind: "QuestionId" });
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Token issued by the remote service for one quiz attempt.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a token received from the remote service.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the token is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty { kind: "SessionId" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Error returned when an identifier cannot be built from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum IdError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },
}

impl fmt::Debug for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuizId({})", self.0)
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

// Session tokens stay out of debug output.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(..)")
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

impl FromStr for QuizId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(QuizId::new(s))
    }
}

impl FromStr for QuestionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionId::new(s)
    }
}

impl FromStr for SessionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionId::new(s)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_quiz_id_falls_back_to_default() {
        assert_eq!(QuizId::new("  ").as_str(), DEFAULT_QUIZ_ID);
        assert_eq!(QuizId::new(" intro ").as_str(), "intro");
    }

    #[test]
    fn question_id_rejects_blank() {
        assert!(QuestionId::new("").is_err());
        assert_eq!("q1".parse::<QuestionId>().unwrap().as_str(), "q1");
    }

    #[test]
    fn session_id_is_trimmed_and_hidden_in_debug() {
        let id = SessionId::new(" abc ").unwrap();
        assert_eq!(id.as_str(), "abc");
        assert_eq!(format!("{id:?}"), "SessionId(..)");
        assert!(SessionId::new("\t").is_err());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = QuestionId::new("q7").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"q7\"");
    }
}
