use crate::model::ids::QuizId;

/// Storage scope used when the caller does not pick one.
pub const DEFAULT_SCOPE: &str = "default";

/// Quiz selector plus storage scope; isolates one quiz's persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuizIdentity {
    quiz_id: QuizId,
    scope: String,
}

impl QuizIdentity {
    #[must_use]
    pub fn new(quiz_id: QuizId, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        let scope = scope.trim();
        Self {
            quiz_id,
            scope: if scope.is_empty() {
                DEFAULT_SCOPE.to_owned()
            } else {
                scope.to_owned()
            },
        }
    }

    #[must_use]
    pub fn quiz_id(&self) -> &QuizId {
        &self.quiz_id
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Prefix shared by every persisted key of this identity.
    ///
    /// Both parts are percent-encoded so a `:` inside one of them cannot
    /// shift the boundary between scope and quiz id.
    #[must_use]
    pub fn key_prefix(&self) -> String {
        format!(
            "quiz:{}:{}",
            urlencoding::encode(&self.scope),
            urlencoding::encode(self.quiz_id.as_str())
        )
    }
}

impl Default for QuizIdentity {
    fn default() -> Self {
        Self::new(QuizId::default(), DEFAULT_SCOPE)
    }
}

/// Quiz-level settings from the metadata endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizMetadata {
    pub pass_score: u32,
}
