use std::collections::HashMap;

use crate::model::ids::QuestionId;

//
// ─── ANSWER RECORD ─────────────────────────────────────────────────────────────
//

/// Last graded answer for one question.
///
/// Only ever built from a complete grading response, so a record is either
/// absent or fully populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub raw_answer: String,
    pub verdict: bool,
    pub feedback: String,
}

impl AnswerRecord {
    #[must_use]
    pub fn new(
        question_id: QuestionId,
        raw_answer: impl Into<String>,
        verdict: bool,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            question_id,
            raw_answer: raw_answer.into(),
            verdict,
            feedback: feedback.into(),
        }
    }
}

//
// ─── STATS ─────────────────────────────────────────────────────────────────────
//

/// `(total, answered, correct)` at one point in time; the finalization cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProgressTriple {
    pub total: u32,
    pub answered: u32,
    pub correct: u32,
}

/// Aggregate progress over the current question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressStats {
    pub total: u32,
    pub answered: u32,
    pub correct: u32,
    pub pass_threshold: u32,
}

impl ProgressStats {
    #[must_use]
    pub fn triple(&self) -> ProgressTriple {
        ProgressTriple {
            total: self.total,
            answered: self.answered,
            correct: self.correct,
        }
    }

    /// True once every question has an answer.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.answered >= self.total
    }
}

//
// ─── LEDGER ────────────────────────────────────────────────────────────────────
//

/// Mapping from question id to its last graded answer.
///
/// May hold entries for questions that are no longer in the current list;
/// stats only count ids that are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressLedger {
    records: HashMap<QuestionId, AnswerRecord>,
}

impl ProgressLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = AnswerRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.question_id.clone(), record))
            .collect();
        Self { records }
    }

    /// Insert or overwrite the record for its question id.
    pub fn upsert(&mut self, record: AnswerRecord) -> Option<AnswerRecord> {
        self.records.insert(record.question_id.clone(), record)
    }

    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&AnswerRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Count answered and correct questions among `question_ids`.
    #[must_use]
    pub fn stats(&self, question_ids: &[QuestionId], pass_threshold: u32) -> ProgressStats {
        let mut answered = 0_u32;
        let mut correct = 0_u32;
        for id in question_ids {
            if let Some(record) = self.records.get(id) {
                answered = answered.saturating_add(1);
                if record.verdict {
                    correct = correct.saturating_add(1);
                }
            }
        }

        ProgressStats {
            total: u32::try_from(question_ids.len()).unwrap_or(u32::MAX),
            answered,
            correct,
            pass_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qid(raw: &str) -> QuestionId {
        QuestionId::new(raw).unwrap()
    }

    #[test]
    fn stats_ignore_stale_entries() {
        let mut ledger = ProgressLedger::new();
        ledger.upsert(AnswerRecord::new(qid("q1"), "a", true, "ok"));
        ledger.upsert(AnswerRecord::new(qid("gone"), "b", true, "ok"));

        let stats = ledger.stats(&[qid("q1"), qid("q2")], 1);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.answered, 1);
        assert_eq!(stats.correct, 1);
        assert!(!stats.is_complete());
    }

    #[test]
    fn stats_are_order_independent() {
        let ledger = ProgressLedger::from_records([
            AnswerRecord::new(qid("q1"), "a", true, ""),
            AnswerRecord::new(qid("q2"), "b", false, ""),
        ]);

        let forward = ledger.stats(&[qid("q1"), qid("q2")], 1);
        let backward = ledger.stats(&[qid("q2"), qid("q1")], 1);
        assert_eq!(forward, backward);
        assert!(forward.is_complete());
        assert_eq!(
            forward.triple(),
            ProgressTriple {
                total: 2,
                answered: 2,
                correct: 1
            }
        );
    }

    #[test]
    fn upsert_overwrites_previous_record() {
        let mut ledger = ProgressLedger::new();
        ledger.upsert(AnswerRecord::new(qid("q1"), "first", false, "hint"));
        let previous = ledger.upsert(AnswerRecord::new(qid("q1"), "second", true, "nice"));

        assert_eq!(previous.map(|r| r.raw_answer), Some("first".to_owned()));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get(&qid("q1")).unwrap().verdict);
    }

    #[test]
    fn empty_question_list_is_never_complete() {
        let stats = ProgressLedger::new().stats(&[], 0);
        assert_eq!(stats.total, 0);
        assert!(!stats.is_complete());
    }
}
