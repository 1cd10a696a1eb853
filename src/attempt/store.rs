//! Durable exam attempt session
//!
//! One store instance owns the state of one learner's attempt at one test,
//! identified by `test_id`. Every mutation is a read-merge-write of the whole
//! state under a single async lock, then a best-effort persist: the in-memory
//! state stays authoritative for the process lifetime even when the substrate
//! is unavailable. Two processes (or browser tabs) on the same test id are
//! explicitly unsupported and may race.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::clock::{self, RemainingTime};
use super::storage::AttemptStorage;

// ============================================================================
// State Types
// ============================================================================

/// Persisted state of one attempt.
///
/// Invariants: `active` implies `started_at_ms` is set and `submitted_at_ms`
/// is not; `started_at_ms` and `submitted_at_ms` are each set once and only
/// cleared by an explicit reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttemptState {
    /// True between start and submit
    pub active: bool,

    /// Wall-clock epoch ms when the attempt began
    pub started_at_ms: Option<i64>,

    pub duration_minutes: u32,

    pub total_questions: u32,

    /// Latest answer per question id; last write wins per key
    pub answers: HashMap<String, serde_json::Value>,

    /// Wall-clock epoch ms of submission
    pub submitted_at_ms: Option<i64>,
}

/// Fixed parameters handed to `start_attempt`
#[derive(Debug, Clone, Copy)]
pub struct AttemptMeta {
    pub duration_minutes: u32,
    pub total_questions: u32,
}

// ============================================================================
// Store
// ============================================================================

/// Durable, per-test attempt session state
pub struct AttemptStateStore<S: AttemptStorage> {
    test_id: String,
    storage: Arc<S>,
    state: Mutex<AttemptState>,
}

impl<S: AttemptStorage> AttemptStateStore<S> {
    /// Load the attempt for `test_id` from durable storage.
    ///
    /// An absent, unreadable, or unparseable record degrades to a fresh empty
    /// state; loading never fails.
    pub async fn load(test_id: impl Into<String>, storage: Arc<S>) -> Self {
        let test_id = test_id.into();
        let key = storage_key(&test_id);

        let state = match storage.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<AttemptState>(&raw) {
                Ok(state) => state,
                Err(error) => {
                    tracing::warn!(
                        test_id = %test_id,
                        error = %error,
                        "Persisted attempt state unparseable, starting fresh"
                    );
                    AttemptState::default()
                }
            },
            Ok(None) => AttemptState::default(),
            Err(error) => {
                tracing::warn!(
                    test_id = %test_id,
                    error = %error,
                    "Attempt state read failed, starting fresh"
                );
                AttemptState::default()
            }
        };

        Self {
            test_id,
            storage,
            state: Mutex::new(state),
        }
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// Begin the attempt. A no-op while one is already active, guarding
    /// against double-start from duplicate host events or remounts.
    pub async fn start_attempt(&self, meta: AttemptMeta) {
        let mut state = self.state.lock().await;
        if state.active {
            tracing::debug!(test_id = %self.test_id, "Attempt already active, start ignored");
            return;
        }

        state.active = true;
        state.started_at_ms = Some(Utc::now().timestamp_millis());
        state.duration_minutes = meta.duration_minutes;
        state.total_questions = meta.total_questions;
        state.answers.clear();
        state.submitted_at_ms = None;

        tracing::info!(
            test_id = %self.test_id,
            duration_minutes = meta.duration_minutes,
            total_questions = meta.total_questions,
            "Attempt started"
        );

        self.persist(&state).await;
    }

    /// Record one answer; last write wins per question id.
    ///
    /// Safe to call at high frequency: each call merges into the full state
    /// and persists under the same lock, so interleaved saves never lose a
    /// sibling question's answer.
    pub async fn save_answer(&self, question_id: impl Into<String>, value: serde_json::Value) {
        let mut state = self.state.lock().await;
        state.answers.insert(question_id.into(), value);
        self.persist(&state).await;
    }

    /// Submit the attempt, keeping answers available for review.
    pub async fn submit_attempt(&self) {
        let mut state = self.state.lock().await;
        if !state.active {
            tracing::debug!(test_id = %self.test_id, "No active attempt, submit ignored");
            return;
        }

        state.active = false;
        state.submitted_at_ms = Some(Utc::now().timestamp_millis());

        tracing::info!(
            test_id = %self.test_id,
            answered = state.answers.len(),
            "Attempt submitted"
        );

        self.persist(&state).await;
    }

    /// Abandon the attempt and return to the fresh empty state
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = AttemptState::default();

        if let Err(error) = self.storage.delete(&storage_key(&self.test_id)).await {
            tracing::warn!(
                test_id = %self.test_id,
                error = %error,
                "Attempt state delete failed, in-memory state reset anyway"
            );
        }
    }

    /// Read-only copy of the current state
    pub async fn snapshot(&self) -> AttemptState {
        self.state.lock().await.clone()
    }

    /// Derived clock snapshot for the current state
    pub async fn remaining(&self, now_ms: i64) -> RemainingTime {
        let state = self.state.lock().await;
        clock::remaining(now_ms, state.started_at_ms, state.duration_minutes)
    }

    /// Best-effort persist; durability failures never reach the caller.
    async fn persist(&self, state: &AttemptState) {
        let serialized = match serde_json::to_string(state) {
            Ok(serialized) => serialized,
            Err(error) => {
                tracing::warn!(test_id = %self.test_id, error = %error, "Attempt state serialization failed");
                return;
            }
        };

        if let Err(error) = self
            .storage
            .set(&storage_key(&self.test_id), &serialized)
            .await
        {
            tracing::warn!(
                test_id = %self.test_id,
                error = %error,
                "Attempt state persist failed, in-memory state remains authoritative"
            );
        }
    }
}

fn storage_key(test_id: &str) -> String {
    format!("attempt:{test_id}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::storage::{MemoryStorage, StorageError};
    use serde_json::json;

    const META: AttemptMeta = AttemptMeta {
        duration_minutes: 10,
        total_questions: 20,
    };

    async fn fresh_store() -> AttemptStateStore<MemoryStorage> {
        AttemptStateStore::load("t1", Arc::new(MemoryStorage::new())).await
    }

    #[tokio::test]
    async fn load_without_record_is_fresh() {
        let store = fresh_store().await;
        let state = store.snapshot().await;

        assert!(!state.active);
        assert!(state.answers.is_empty());
        assert_eq!(state.started_at_ms, None);
    }

    #[tokio::test]
    async fn corrupted_record_degrades_to_fresh_state() {
        let storage = Arc::new(MemoryStorage::new());
        storage.seed("attempt:t1", "{not json at all").await;

        let store = AttemptStateStore::load("t1", storage).await;
        let state = store.snapshot().await;

        assert!(!state.active);
        assert!(state.answers.is_empty());
    }

    #[tokio::test]
    async fn start_is_idempotent_while_active() {
        let store = fresh_store().await;

        store.start_attempt(META).await;
        store.save_answer("q1", json!("A")).await;
        let first = store.snapshot().await;

        store
            .start_attempt(AttemptMeta {
                duration_minutes: 99,
                total_questions: 5,
            })
            .await;
        let second = store.snapshot().await;

        assert_eq!(second.started_at_ms, first.started_at_ms);
        assert_eq!(second.duration_minutes, 10);
        assert_eq!(second.answers, first.answers);
    }

    #[tokio::test]
    async fn answers_merge_with_last_write_wins() {
        let store = fresh_store().await;
        store.start_attempt(META).await;

        store.save_answer("q1", json!("A")).await;
        store.save_answer("q2", json!("B")).await;
        store.save_answer("q1", json!("C")).await;

        let state = store.snapshot().await;
        assert_eq!(state.answers.len(), 2);
        assert_eq!(state.answers["q1"], json!("C"));
        assert_eq!(state.answers["q2"], json!("B"));
    }

    #[tokio::test]
    async fn submit_keeps_answers_and_stamps_once() {
        let store = fresh_store().await;
        store.start_attempt(META).await;
        store.save_answer("q1", json!("A")).await;

        store.submit_attempt().await;
        let submitted = store.snapshot().await;

        assert!(!submitted.active);
        assert!(submitted.submitted_at_ms.is_some());
        assert_eq!(submitted.answers["q1"], json!("A"));

        // A second submit with no active attempt changes nothing
        store.submit_attempt().await;
        assert_eq!(store.snapshot().await, submitted);
    }

    #[tokio::test]
    async fn reset_returns_to_fresh_state() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AttemptStateStore::load("t1", Arc::clone(&storage)).await;

        store.start_attempt(META).await;
        store.save_answer("q1", json!("A")).await;
        store.reset().await;

        assert_eq!(store.snapshot().await, AttemptState::default());
        assert_eq!(storage.get("attempt:t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn state_survives_reload_from_storage() {
        let storage = Arc::new(MemoryStorage::new());

        {
            let store = AttemptStateStore::load("t1", Arc::clone(&storage)).await;
            store.start_attempt(META).await;
            store.save_answer("q3", json!({"choice": 2})).await;
        }

        let reloaded = AttemptStateStore::load("t1", storage).await;
        let state = reloaded.snapshot().await;

        assert!(state.active);
        assert_eq!(state.total_questions, 20);
        assert_eq!(state.answers["q3"], json!({"choice": 2}));
    }

    #[tokio::test]
    async fn remaining_tracks_attempt_clock() {
        let store = fresh_store().await;

        // Inactive: clock reads zero
        assert_eq!(store.remaining(1_000).await, RemainingTime::ZERO);

        store.start_attempt(META).await;
        let started = store.snapshot().await.started_at_ms.unwrap();

        let r = store.remaining(started + 60_000).await;
        assert_eq!(r.minutes, 9);
        assert_eq!(r.seconds, 0);
    }

    /// Storage that refuses every write
    struct RejectingStorage;

    #[async_trait::async_trait]
    impl AttemptStorage for RejectingStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Read("disk gone".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Write("quota exceeded".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Write("quota exceeded".to_string()))
        }
    }

    #[tokio::test]
    async fn persistence_failures_leave_memory_authoritative() {
        let store = AttemptStateStore::load("t1", Arc::new(RejectingStorage)).await;

        store.start_attempt(META).await;
        store.save_answer("q1", json!("A")).await;

        let state = store.snapshot().await;
        assert!(state.active);
        assert_eq!(state.answers["q1"], json!("A"));
    }
}
