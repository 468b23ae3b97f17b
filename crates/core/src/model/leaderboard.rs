/// One ranked row of the cross-user leaderboard, in service order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub nickname: String,
    pub best_correct: u32,
    pub best_answered: u32,
    pub last_activity_at: String,
    pub attempts: Option<u32>,
}

/// Smallest and largest row count the leaderboard endpoint serves.
pub const LEADERBOARD_LIMIT_RANGE: (u32, u32) = (1, 200);

/// Clamp a requested row count into [`LEADERBOARD_LIMIT_RANGE`].
#[must_use]
pub fn clamp_leaderboard_limit(limit: u32) -> u32 {
    let (min, max) = LEADERBOARD_LIMIT_RANGE;
    limit.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_leaderboard_limit(0), 1);
        assert_eq!(clamp_leaderboard_limit(20), 20);
        assert_eq!(clamp_leaderboard_limit(5_000), 200);
    }
}
