/// Direction of a single navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl Direction {
    #[must_use]
    pub fn delta(self) -> isize {
        match self {
            Direction::Previous => -1,
            Direction::Next => 1,
        }
    }
}

/// Offset into the current question list, kept within `[0, len - 1]`.
///
/// Meaningless for an empty list; it then stays at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationIndex(usize);

impl NavigationIndex {
    /// Build an index clamped into a list of `len` questions.
    #[must_use]
    pub fn clamped(raw: usize, len: usize) -> Self {
        Self(raw.min(len.saturating_sub(1)))
    }

    #[must_use]
    pub fn value(self) -> usize {
        self.0
    }

    /// Move one step, saturating at both ends of the list.
    #[must_use]
    pub fn step(self, direction: Direction, len: usize) -> Self {
        let next = self.0.saturating_add_signed(direction.delta());
        Self::clamped(next, len)
    }
}
