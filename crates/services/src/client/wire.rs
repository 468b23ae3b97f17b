use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use quiz_core::model::{
    LeaderboardEntry, Question, QuestionId, QuizMetadata, SessionId, SessionProfile,
    SessionRequest,
};

use super::{FinalFeedback, GradeResponse, ServerProgress};
use crate::error::ServiceError;

const GUEST_NICKNAME: &str = "Guest";

#[derive(Debug, Serialize)]
pub(super) struct StartSessionBody<'a> {
    pub nickname: Option<&'a str>,
    pub quiz_id: &'a str,
    pub show_in_leaderboard: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct GradeBody<'a> {
    pub session_id: &'a str,
    pub id: &'a str,
    pub answer: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct FinalFeedbackBody<'a> {
    pub session_id: &'a str,
    pub correct: u32,
    pub answered: u32,
    pub total: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct HealthDto {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct MetaDto {
    #[serde(alias = "passScore")]
    pub pass_score: u32,
}

impl From<MetaDto> for QuizMetadata {
    fn from(dto: MetaDto) -> Self {
        Self {
            pass_score: dto.pass_score,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct QuestionsDto {
    #[serde(default)]
    pub questions: Vec<QuestionDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct QuestionDto {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "prompt")]
    pub question: String,
}

impl QuestionsDto {
    /// Drop entries without an id or prompt; the first of any duplicate id wins.
    pub fn into_questions(self) -> Vec<Question> {
        let mut seen = HashSet::new();
        self.questions
            .into_iter()
            .filter_map(|dto| {
                let id = QuestionId::new(dto.id).ok()?;
                Question::new(id, dto.question).ok()
            })
            .filter(|question| seen.insert(question.id().clone()))
            .collect()
    }
}

/// Each spelling is its own field so a body carrying several of them still
/// decodes; the snake_case spelling wins.
#[derive(Debug, Deserialize)]
pub(super) struct SessionDto {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, rename = "sessionId")]
    pub session_id_camel: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub show_in_leaderboard: Option<bool>,
    #[serde(default, rename = "showInLeaderboard")]
    pub show_in_leaderboard_camel: Option<bool>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

impl SessionDto {
    /// Missing nickname or visibility fall back to what was requested.
    pub fn into_profile(self, request: &SessionRequest) -> Result<SessionProfile, ServiceError> {
        let session_id = self
            .session_id
            .or(self.session_id_camel)
            .and_then(|raw| SessionId::new(raw).ok())
            .ok_or_else(|| ServiceError::Protocol("session response has no session id".into()))?;

        let nickname = self
            .nickname
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .or_else(|| request.nickname.clone())
            .unwrap_or_else(|| GUEST_NICKNAME.to_owned());
        let visible = self
            .show_in_leaderboard
            .or(self.show_in_leaderboard_camel)
            .or(self.is_public)
            .unwrap_or(request.show_in_leaderboard);

        Ok(SessionProfile::new(nickname, session_id, visible))
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct GradeDto {
    pub ok: bool,
    #[serde(default)]
    pub feedback: String,
    pub correct: Option<u32>,
    pub answered: Option<u32>,
    pub total: Option<u32>,
}

impl From<GradeDto> for GradeResponse {
    fn from(dto: GradeDto) -> Self {
        let progress = match (dto.correct, dto.answered, dto.total) {
            (Some(correct), Some(answered), Some(total)) => Some(ServerProgress {
                correct,
                answered,
                total,
            }),
            _ => None,
        };
        Self {
            ok: dto.ok,
            feedback: dto.feedback,
            progress,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct FinalFeedbackDto {
    pub passed: bool,
    #[serde(default)]
    pub message: String,
}

impl From<FinalFeedbackDto> for FinalFeedback {
    fn from(dto: FinalFeedbackDto) -> Self {
        Self {
            passed: dto.passed,
            message: dto.message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct LeaderboardDto {
    #[serde(default)]
    pub items: Vec<LeaderboardEntryDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LeaderboardEntryDto {
    pub nickname: String,
    #[serde(alias = "bestCorrect")]
    pub best_correct: u32,
    #[serde(alias = "bestAnswered")]
    pub best_answered: u32,
    #[serde(default, alias = "lastActivityAt")]
    pub last_activity_at: String,
    #[serde(default)]
    pub attempts: Option<u32>,
}

impl From<LeaderboardEntryDto> for LeaderboardEntry {
    fn from(dto: LeaderboardEntryDto) -> Self {
        Self {
            nickname: dto.nickname,
            best_correct: dto.best_correct,
            best_answered: dto.best_answered,
            last_activity_at: dto.last_activity_at,
            attempts: dto.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(nickname: Option<&str>, visible: bool) -> SessionRequest {
        SessionRequest {
            nickname: nickname.map(str::to_owned),
            show_in_leaderboard: visible,
        }
    }

    #[test]
    fn questions_skip_blank_and_duplicate_entries() {
        let dto: QuestionsDto = serde_json::from_str(
            r#"{"questions": [
                {"id": "q1", "question": "What is ownership?"},
                {"id": "", "question": "orphan"},
                {"id": "q2", "question": "   "},
                {"id": "q1", "question": "duplicate"},
                {"id": "q3", "prompt": "Borrowing?"}
            ], "total": 5, "pass_score": 3}"#,
        )
        .unwrap();

        let questions = dto.into_questions();
        let ids: Vec<&str> = questions.iter().map(|q| q.id().as_str()).collect();
        assert_eq!(ids, ["q1", "q3"]);
        assert_eq!(questions[0].prompt(), "What is ownership?");
    }

    #[test]
    fn session_accepts_camel_case() {
        let dto: SessionDto = serde_json::from_str(
            r#"{"sessionId": "abc", "nickname": "neo", "showInLeaderboard": true}"#,
        )
        .unwrap();
        let profile = dto.into_profile(&request(Some("neo"), true)).unwrap();
        assert_eq!(profile.session_id().as_str(), "abc");
        assert!(profile.show_in_leaderboard());
    }

    #[test]
    fn session_without_id_is_a_protocol_error() {
        let dto: SessionDto = serde_json::from_str(r#"{"nickname": "neo"}"#).unwrap();
        let err = dto.into_profile(&request(Some("neo"), false)).unwrap_err();
        assert!(matches!(err, ServiceError::Protocol(_)));

        let blank: SessionDto = serde_json::from_str(r#"{"session_id": "  "}"#).unwrap();
        assert!(blank.into_profile(&request(None, false)).is_err());
    }

    #[test]
    fn session_falls_back_to_request_values() {
        let dto: SessionDto = serde_json::from_str(r#"{"session_id": "s-1"}"#).unwrap();
        let profile = dto.into_profile(&request(None, false)).unwrap();
        assert_eq!(profile.nickname(), GUEST_NICKNAME);
        assert!(!profile.show_in_leaderboard());

        let hidden: SessionDto =
            serde_json::from_str(r#"{"session_id": "s-2", "nickname": "trin", "is_public": false}"#)
                .unwrap();
        let profile = hidden.into_profile(&request(Some("trin"), true)).unwrap();
        assert!(!profile.show_in_leaderboard());
    }

    #[test]
    fn session_tolerates_several_visibility_spellings() {
        let dto: SessionDto = serde_json::from_str(
            r#"{"session_id": "s-3", "sessionId": "s-3", "show_in_leaderboard": true, "showInLeaderboard": true, "is_public": false}"#,
        )
        .unwrap();
        let profile = dto.into_profile(&request(Some("neo"), false)).unwrap();
        assert_eq!(profile.session_id().as_str(), "s-3");
        assert!(profile.show_in_leaderboard());
    }

    #[test]
    fn grade_counters_need_all_three_values() {
        let full: GradeDto =
            serde_json::from_str(r#"{"ok": true, "feedback": "yes", "correct": 1, "answered": 2, "total": 3}"#)
                .unwrap();
        let partial: GradeDto =
            serde_json::from_str(r#"{"ok": false, "feedback": "no", "correct": 1}"#).unwrap();

        assert_eq!(
            GradeResponse::from(full).progress,
            Some(ServerProgress {
                correct: 1,
                answered: 2,
                total: 3
            })
        );
        assert_eq!(GradeResponse::from(partial).progress, None);
    }
}
