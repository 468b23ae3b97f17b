use std::sync::Arc;

use quiz_core::model::{QuizId, SessionDraft, SessionProfile};
use storage::QuizStateStore;

use crate::client::QuizService;
use crate::error::SessionError;

/// Establishes and keeps the session profile for one quiz identity.
///
/// A session id is issued once by the remote service and reused until
/// [`IdentityService::reset`].
pub struct IdentityService {
    service: Arc<dyn QuizService>,
    state: QuizStateStore,
    quiz_id: QuizId,
    profile: Option<SessionProfile>,
}

impl IdentityService {
    #[must_use]
    pub fn new(service: Arc<dyn QuizService>, state: QuizStateStore, quiz_id: QuizId) -> Self {
        Self {
            service,
            state,
            quiz_id,
            profile: None,
        }
    }

    /// Switch to another quiz identity; the in-memory profile is dropped.
    pub fn rescope(&mut self, state: QuizStateStore, quiz_id: QuizId) {
        self.state = state;
        self.quiz_id = quiz_id;
        self.profile = None;
    }

    /// Reload the persisted profile. Absent or corrupt values leave no profile.
    pub async fn restore(&mut self) -> Option<&SessionProfile> {
        self.profile = self.state.load_profile().await;
        self.profile.as_ref()
    }

    #[must_use]
    pub fn profile(&self) -> Option<&SessionProfile> {
        self.profile.as_ref()
    }

    /// Return the existing profile, or create and persist a new one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Nickname` when visibility is requested without a
    /// nickname (no remote call is made), `SessionError::Service` when the
    /// remote call fails and `SessionError::Storage` when the profile cannot be
    /// persisted. No profile is kept on any error.
    pub async fn ensure_session(
        &mut self,
        nickname_input: &str,
        wants_visibility: bool,
    ) -> Result<SessionProfile, SessionError> {
        if let Some(profile) = &self.profile {
            return Ok(profile.clone());
        }
        if let Some(profile) = self.state.load_profile().await {
            tracing::debug!(quiz_id = %self.quiz_id, "Reusing persisted session");
            self.profile = Some(profile.clone());
            return Ok(profile);
        }

        let request = SessionDraft::new(nickname_input, wants_visibility).validate()?;
        let profile = self.service.start_session(&self.quiz_id, &request).await?;
        self.state.save_profile(&profile).await?;

        tracing::info!(
            quiz_id = %self.quiz_id,
            nickname = profile.nickname(),
            visible = profile.show_in_leaderboard(),
            "Session created"
        );
        self.profile = Some(profile.clone());
        Ok(profile)
    }

    /// Forget the profile of the current quiz identity.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the persisted profile cannot be removed;
    /// the in-memory profile is kept in that case.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        self.state.clear_profile().await?;
        self.profile = None;
        Ok(())
    }
}
