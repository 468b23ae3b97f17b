use std::fmt;

use quiz_core::model::{FinalVerdict, ProgressStats, QuestionId};

use crate::client::ServerProgress;

/// Lifecycle state of a `QuizSessionController`.
///
/// Only `Ready` accepts navigation, submission and finalization; the others
/// mark a load or a remote call in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Uninitialized,
    Loading,
    Ready,
    CreatingSession,
    Submitting,
    Finalizing,
}

impl fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::CreatingSession => "creating session",
            Self::Submitting => "submitting",
            Self::Finalizing => "finalizing",
        };
        f.write_str(label)
    }
}

/// What a successful `load` restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub question_count: usize,
    pub nav_index: Option<usize>,
    pub stats: ProgressStats,
    pub restored_session: bool,
    /// True when metadata failed and the previous threshold was kept.
    pub threshold_fallback: bool,
    /// True when a cached verdict for the restored progress is on display.
    pub cached_verdict: bool,
}

/// Result of one accepted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeOutcome {
    pub question_id: QuestionId,
    pub correct: bool,
    pub feedback: String,
    /// Counters echoed by the service, when it sends them.
    pub server_progress: Option<ServerProgress>,
    /// Local stats after recording the answer.
    pub stats: ProgressStats,
}

/// Where a displayed verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    Cached,
    Remote,
    /// Synthesized locally after a remote failure; never persisted.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalResult {
    pub verdict: FinalVerdict,
    pub source: VerdictSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoQuestions,
    Incomplete { answered: u32, total: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Skipped(SkipReason),
    Finished(FinalResult),
}

impl FinalizeOutcome {
    #[must_use]
    pub fn result(&self) -> Option<&FinalResult> {
        match self {
            Self::Finished(result) => Some(result),
            Self::Skipped(_) => None,
        }
    }
}
