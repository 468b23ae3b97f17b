mod ids;
mod leaderboard;
mod navigation;
mod progress;
mod question;
mod quiz;
mod session;
mod verdict;

pub use ids::{DEFAULT_QUIZ_ID, IdError, QuestionId, QuizId, SessionId};
pub use leaderboard::{LEADERBOARD_LIMIT_RANGE, LeaderboardEntry, clamp_leaderboard_limit};
pub use navigation::{Direction, NavigationIndex};
pub use progress::{AnswerRecord, ProgressLedger, ProgressStats, ProgressTriple};
pub use question::{Question, QuestionError};
pub use quiz::{DEFAULT_SCOPE, QuizIdentity, QuizMetadata};
pub use session::{
    MAX_NICKNAME_CHARS, NicknameError, SessionDraft, SessionProfile, SessionRequest,
    normalize_nickname,
};
pub use verdict::{FALLBACK_MESSAGE, FinalVerdict};
