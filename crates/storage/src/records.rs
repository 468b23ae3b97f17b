//! Persisted JSON shapes for quiz state.
//!
//! These mirror the domain types so the store can serialize them without the
//! domain layer knowing about storage formats. Decoding is lenient on purpose:
//! anything that does not parse into the expected shape decodes to `None`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use quiz_core::model::{
    AnswerRecord, FinalVerdict, ProgressLedger, ProgressTriple, QuestionId, SessionId,
    SessionProfile,
};

use crate::repository::StorageError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub answers: BTreeMap<String, AnswerEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub answer: String,
    pub ok: bool,
    pub feedback: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub passed: bool,
    pub message: String,
    pub correct: u32,
    pub answered: u32,
    pub total: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub nickname: String,
    pub session_id: String,
    pub show_in_leaderboard: bool,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_ledger(ledger: &ProgressLedger) -> Self {
        let answers = ledger
            .records()
            .map(|record| {
                (
                    record.question_id.as_str().to_owned(),
                    AnswerEntry {
                        answer: record.raw_answer.clone(),
                        ok: record.verdict,
                        feedback: record.feedback.clone(),
                    },
                )
            })
            .collect();
        Self { answers }
    }

    /// Entries with an unusable question id are dropped.
    #[must_use]
    pub fn into_ledger(self) -> ProgressLedger {
        ProgressLedger::from_records(self.answers.into_iter().filter_map(|(id, entry)| {
            let id = QuestionId::new(id).ok()?;
            Some(AnswerRecord::new(id, entry.answer, entry.ok, entry.feedback))
        }))
    }
}

impl VerdictRecord {
    #[must_use]
    pub fn from_verdict(verdict: &FinalVerdict) -> Self {
        Self {
            passed: verdict.passed,
            message: verdict.message.clone(),
            correct: verdict.correct(),
            answered: verdict.answered(),
            total: verdict.total(),
        }
    }

    #[must_use]
    pub fn into_verdict(self) -> FinalVerdict {
        FinalVerdict::new(
            self.passed,
            self.message,
            ProgressTriple {
                total: self.total,
                answered: self.answered,
                correct: self.correct,
            },
        )
    }
}

impl ProfileRecord {
    #[must_use]
    pub fn from_profile(profile: &SessionProfile) -> Self {
        Self {
            nickname: profile.nickname().to_owned(),
            session_id: profile.session_id().as_str().to_owned(),
            show_in_leaderboard: profile.show_in_leaderboard(),
        }
    }

    /// A profile without a usable session id is not a profile.
    #[must_use]
    pub fn into_profile(self) -> Option<SessionProfile> {
        let session_id = SessionId::new(self.session_id).ok()?;
        Some(SessionProfile::new(
            self.nickname,
            session_id,
            self.show_in_leaderboard,
        ))
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|err| StorageError::Serialization(err.to_string()))
}

#[must_use]
pub fn decode_ledger(raw: &str) -> Option<ProgressLedger> {
    serde_json::from_str::<ProgressRecord>(raw)
        .ok()
        .map(ProgressRecord::into_ledger)
}

#[must_use]
pub fn decode_verdict(raw: &str) -> Option<FinalVerdict> {
    serde_json::from_str::<VerdictRecord>(raw)
        .ok()
        .map(VerdictRecord::into_verdict)
}

#[must_use]
pub fn decode_profile(raw: &str) -> Option<SessionProfile> {
    serde_json::from_str::<ProfileRecord>(raw)
        .ok()
        .and_then(ProfileRecord::into_profile)
}

#[must_use]
pub fn decode_nav_index(raw: &str) -> Option<usize> {
    raw.trim().parse().ok()
}
