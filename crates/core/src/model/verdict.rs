use crate::model::progress::{ProgressStats, ProgressTriple};

/// Message shown when the remote verdict service is unavailable.
pub const FALLBACK_MESSAGE: &str =
    "Sorry, we could not get final feedback right now. Try finishing the quiz again later.";

/// Memo of the last successful finalization.
///
/// Keyed implicitly by the progress triple it was computed from; it stops
/// being valid as soon as any answer record changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalVerdict {
    pub passed: bool,
    pub message: String,
    pub progress: ProgressTriple,
}

impl FinalVerdict {
    #[must_use]
    pub fn new(passed: bool, message: impl Into<String>, progress: ProgressTriple) -> Self {
        Self {
            passed,
            message: message.into(),
            progress,
        }
    }

    /// Local verdict used when the remote service cannot be reached.
    ///
    /// Counts are clamped into `[0, total]` before the threshold check.
    #[must_use]
    pub fn fallback(stats: &ProgressStats) -> Self {
        let total = stats.total;
        let progress = ProgressTriple {
            total,
            answered: stats.answered.min(total),
            correct: stats.correct.min(total),
        };
        Self {
            passed: progress.correct >= stats.pass_threshold,
            message: FALLBACK_MESSAGE.to_owned(),
            progress,
        }
    }

    /// True when this verdict was computed from exactly `progress`.
    #[must_use]
    pub fn matches(&self, progress: &ProgressTriple) -> bool {
        self.progress == *progress
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.progress.correct
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.progress.answered
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.progress.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(total: u32, answered: u32, correct: u32, pass_threshold: u32) -> ProgressStats {
        ProgressStats {
            total,
            answered,
            correct,
            pass_threshold,
        }
    }

    #[test]
    fn fallback_compares_correct_against_threshold() {
        assert!(FinalVerdict::fallback(&stats(2, 2, 1, 1)).passed);
        assert!(!FinalVerdict::fallback(&stats(2, 2, 1, 2)).passed);
        assert_eq!(FinalVerdict::fallback(&stats(2, 0, 0, 1)).message, FALLBACK_MESSAGE);
    }

    #[test]
    fn fallback_clamps_counts_to_total() {
        let verdict = FinalVerdict::fallback(&stats(2, 5, 4, 3));
        assert_eq!(verdict.answered(), 2);
        assert_eq!(verdict.correct(), 2);
        assert!(!verdict.passed);
    }

    #[test]
    fn matches_requires_exact_triple() {
        let verdict = FinalVerdict::new(true, "gg", stats(2, 2, 1, 1).triple());
        assert!(verdict.matches(&stats(2, 2, 1, 0).triple()));
        assert!(!verdict.matches(&stats(2, 2, 2, 1).triple()));
        assert!(!verdict.matches(&stats(3, 2, 1, 1).triple()));
    }
}
