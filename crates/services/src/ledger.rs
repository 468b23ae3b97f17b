use quiz_core::model::{
    AnswerRecord, FinalVerdict, ProgressLedger, ProgressStats, QuestionId,
};
use storage::QuizStateStore;

use crate::error::LedgerError;

/// Persisted progress ledger plus the cached final verdict derived from it.
pub struct LedgerService {
    state: QuizStateStore,
    ledger: ProgressLedger,
    cached_verdict: Option<FinalVerdict>,
}

impl LedgerService {
    #[must_use]
    pub fn new(state: QuizStateStore) -> Self {
        Self {
            state,
            ledger: ProgressLedger::new(),
            cached_verdict: None,
        }
    }

    /// Switch to another quiz identity; in-memory records are dropped.
    pub fn rescope(&mut self, state: QuizStateStore) {
        self.state = state;
        self.ledger.clear();
        self.cached_verdict = None;
    }

    /// Reload records and the cached verdict from storage.
    pub async fn restore(&mut self) {
        self.ledger = self.state.load_ledger().await;
        self.cached_verdict = self.state.load_verdict().await;
    }

    #[must_use]
    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    #[must_use]
    pub fn get(&self, question_id: &QuestionId) -> Option<&AnswerRecord> {
        self.ledger.get(question_id)
    }

    /// Upsert one graded answer and persist the whole ledger.
    ///
    /// The cached verdict is dropped first, so a failed write never leaves a
    /// verdict behind for records that changed. If the ledger write fails the
    /// previous records stay in place, in memory and in storage.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the verdict cannot be cleared or the
    /// ledger cannot be written.
    pub async fn record_answer(
        &mut self,
        record: AnswerRecord,
    ) -> Result<Option<AnswerRecord>, LedgerError> {
        self.invalidate_verdict().await?;

        let mut next = self.ledger.clone();
        let previous = next.upsert(record);
        self.state.save_ledger(&next).await?;
        self.ledger = next;
        Ok(previous)
    }

    #[must_use]
    pub fn stats(&self, question_ids: &[QuestionId], pass_threshold: u32) -> ProgressStats {
        self.ledger.stats(question_ids, pass_threshold)
    }

    #[must_use]
    pub fn cached_verdict(&self) -> Option<&FinalVerdict> {
        self.cached_verdict.as_ref()
    }

    /// Cache a remote verdict. It stays cached in memory even if the write fails.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the verdict cannot be persisted.
    pub async fn remember_verdict(&mut self, verdict: FinalVerdict) -> Result<(), LedgerError> {
        let result = self.state.save_verdict(&verdict).await;
        self.cached_verdict = Some(verdict);
        result.map_err(LedgerError::from)
    }

    /// Drop the cached verdict, in storage first and then in memory.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the persisted verdict cannot be removed.
    pub async fn invalidate_verdict(&mut self) -> Result<(), LedgerError> {
        if self.cached_verdict.is_some() {
            tracing::debug!("Invalidating cached final verdict");
        }
        self.state.clear_verdict().await?;
        self.cached_verdict = None;
        Ok(())
    }

    /// Clear the cached verdict, all records and the navigation index.
    /// The session profile is untouched.
    ///
    /// Memory follows storage step by step: records are dropped in memory as
    /// soon as their removal succeeds, even if a later step fails.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if any persisted value cannot be removed.
    pub async fn reset(&mut self) -> Result<(), LedgerError> {
        self.invalidate_verdict().await?;
        self.state.clear_ledger().await?;
        self.ledger.clear();
        self.state.clear_nav_index().await?;
        Ok(())
    }
}
