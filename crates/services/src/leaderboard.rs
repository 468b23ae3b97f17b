use std::fmt;
use std::sync::Arc;

use quiz_core::model::LeaderboardEntry;

use crate::client::QuizService;

/// Last rendered leaderboard snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LeaderboardState {
    #[default]
    Idle,
    Empty,
    /// Entries in service order.
    Loaded(Vec<LeaderboardEntry>),
    Failed(String),
}

impl fmt::Display for LeaderboardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Leaderboard not loaded yet."),
            Self::Empty => f.write_str("No results yet. Be the first!"),
            Self::Failed(detail) => write!(f, "Could not load the leaderboard: {detail}"),
            Self::Loaded(entries) => {
                writeln!(f, "{:>3}  {:<24} {:>7} {:>8}  {}", "#", "nickname", "correct", "answered", "last activity")?;
                for (rank, entry) in entries.iter().enumerate() {
                    write!(
                        f,
                        "{:>3}  {:<24} {:>7} {:>8}  {}",
                        rank + 1,
                        entry.nickname,
                        entry.best_correct,
                        entry.best_answered,
                        entry.last_activity_at
                    )?;
                    if let Some(attempts) = entry.attempts {
                        write!(f, " ({attempts} attempts)")?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
        }
    }
}

/// Read-only view over the remote leaderboard.
pub struct LeaderboardView {
    service: Arc<dyn QuizService>,
    state: LeaderboardState,
}

impl LeaderboardView {
    #[must_use]
    pub fn new(service: Arc<dyn QuizService>) -> Self {
        Self {
            service,
            state: LeaderboardState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> &LeaderboardState {
        &self.state
    }

    /// Fetch up to `limit` entries. Failures become `LeaderboardState::Failed`.
    pub async fn refresh(&mut self, limit: u32) -> &LeaderboardState {
        self.state = match self.service.leaderboard(limit).await {
            Ok(entries) if entries.is_empty() => LeaderboardState::Empty,
            Ok(entries) => LeaderboardState::Loaded(entries),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to fetch leaderboard");
                LeaderboardState::Failed(err.to_string())
            }
        };
        &self.state
    }
}
