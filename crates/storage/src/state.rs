use std::sync::Arc;

use quiz_core::model::{FinalVerdict, ProgressLedger, QuizIdentity, SessionProfile};

use crate::records::{
    ProfileRecord, ProgressRecord, VerdictRecord, decode_ledger, decode_nav_index, decode_profile,
    decode_verdict, encode,
};
use crate::repository::{KeyValueStore, StorageError};

/// One persisted concern per quiz identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    NavIndex,
    Progress,
    FinalVerdict,
    Session,
}

impl StateKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::NavIndex => "nav_index",
            StateKey::Progress => "progress",
            StateKey::FinalVerdict => "final_verdict",
            StateKey::Session => "session",
        }
    }
}

/// Typed view of the key/value store, scoped to one quiz identity.
///
/// Loads never fail: unreadable, absent or corrupt values come back as the
/// empty/default value. Writes report errors to the caller.
#[derive(Clone)]
pub struct QuizStateStore {
    kv: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl QuizStateStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, identity: &QuizIdentity) -> Self {
        Self {
            kv,
            prefix: identity.key_prefix(),
        }
    }

    #[must_use]
    pub fn key(&self, key: StateKey) -> String {
        format!("{}:{}", self.prefix, key.as_str())
    }

    async fn read(&self, key: StateKey) -> Option<String> {
        let full_key = self.key(key);
        match self.kv.get(&full_key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %full_key, error = %err, "Failed to read persisted state");
                None
            }
        }
    }

    fn discard(&self, key: StateKey) {
        tracing::warn!(key = %self.key(key), "Ignoring corrupt persisted state");
    }

    async fn write(&self, key: StateKey, value: &str) -> Result<(), StorageError> {
        self.kv.set(&self.key(key), value).await
    }

    async fn clear(&self, key: StateKey) -> Result<(), StorageError> {
        self.kv.remove(&self.key(key)).await
    }

    // ─── Navigation index ──────────────────────────────────────────────────────

    pub async fn load_nav_index(&self) -> usize {
        let Some(raw) = self.read(StateKey::NavIndex).await else {
            return 0;
        };
        decode_nav_index(&raw).unwrap_or_else(|| {
            self.discard(StateKey::NavIndex);
            0
        })
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn save_nav_index(&self, index: usize) -> Result<(), StorageError> {
        self.write(StateKey::NavIndex, &index.to_string()).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    pub async fn clear_nav_index(&self) -> Result<(), StorageError> {
        self.clear(StateKey::NavIndex).await
    }

    // ─── Progress ledger ───────────────────────────────────────────────────────

    pub async fn load_ledger(&self) -> ProgressLedger {
        let Some(raw) = self.read(StateKey::Progress).await else {
            return ProgressLedger::new();
        };
        decode_ledger(&raw).unwrap_or_else(|| {
            self.discard(StateKey::Progress);
            ProgressLedger::new()
        })
    }

    /// Persist the whole ledger as a single value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the write fails; the previous value
    /// is then still in place.
    pub async fn save_ledger(&self, ledger: &ProgressLedger) -> Result<(), StorageError> {
        let raw = encode(&ProgressRecord::from_ledger(ledger))?;
        self.write(StateKey::Progress, &raw).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    pub async fn clear_ledger(&self) -> Result<(), StorageError> {
        self.clear(StateKey::Progress).await
    }

    // ─── Final verdict ─────────────────────────────────────────────────────────

    pub async fn load_verdict(&self) -> Option<FinalVerdict> {
        let raw = self.read(StateKey::FinalVerdict).await?;
        let verdict = decode_verdict(&raw);
        if verdict.is_none() {
            self.discard(StateKey::FinalVerdict);
        }
        verdict
    }

    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the write fails.
    pub async fn save_verdict(&self, verdict: &FinalVerdict) -> Result<(), StorageError> {
        let raw = encode(&VerdictRecord::from_verdict(verdict))?;
        self.write(StateKey::FinalVerdict, &raw).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    pub async fn clear_verdict(&self) -> Result<(), StorageError> {
        self.clear(StateKey::FinalVerdict).await
    }

    // ─── Session profile ───────────────────────────────────────────────────────

    pub async fn load_profile(&self) -> Option<SessionProfile> {
        let raw = self.read(StateKey::Session).await?;
        let profile = decode_profile(&raw);
        if profile.is_none() {
            self.discard(StateKey::Session);
        }
        profile
    }

    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the write fails.
    pub async fn save_profile(&self, profile: &SessionProfile) -> Result<(), StorageError> {
        let raw = encode(&ProfileRecord::from_profile(profile))?;
        self.write(StateKey::Session, &raw).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    pub async fn clear_profile(&self) -> Result<(), StorageError> {
        self.clear(StateKey::Session).await
    }
}
