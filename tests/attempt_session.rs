//! Exam-session scenarios: attempt state surviving a process restart via
//! SQLite, and the proctoring lifecycle wrapped around an attempt.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use examgate::proctoring::{ProctoringError, ProctoringHooks, ProctoringLifecycleCoordinator};
use examgate::{remaining, AttemptMeta, AttemptStateStore, SqliteStorage};

const META: AttemptMeta = AttemptMeta {
    duration_minutes: 30,
    total_questions: 40,
};

#[tokio::test]
async fn attempt_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("attempts.db");

    let started_at = {
        let storage = Arc::new(SqliteStorage::connect_file(&db_path).await.unwrap());
        let store = AttemptStateStore::load("physics-mock-3", storage).await;

        store.start_attempt(META).await;
        store.save_answer("q1", json!("B")).await;
        store.save_answer("q2", json!([1, 3])).await;
        store.save_answer("q1", json!("D")).await;

        store.snapshot().await.started_at_ms.unwrap()
    };

    // Fresh pool over the same file, as after a tab reload
    let storage = Arc::new(SqliteStorage::connect_file(&db_path).await.unwrap());
    let store = AttemptStateStore::load("physics-mock-3", storage).await;
    let state = store.snapshot().await;

    assert!(state.active);
    assert_eq!(state.started_at_ms, Some(started_at));
    assert_eq!(state.duration_minutes, 30);
    assert_eq!(state.answers["q1"], json!("D"));
    assert_eq!(state.answers["q2"], json!([1, 3]));

    // The clock keeps deriving from the original start timestamp
    let r = store.remaining(started_at + 29 * 60_000).await;
    assert_eq!(r.minutes, 1);
    assert_eq!(r.seconds, 0);

    // Submission closes the attempt and survives another reload
    store.submit_attempt().await;

    let storage = Arc::new(SqliteStorage::connect_file(&db_path).await.unwrap());
    let reloaded = AttemptStateStore::load("physics-mock-3", storage).await;
    let state = reloaded.snapshot().await;
    assert!(!state.active);
    assert!(state.submitted_at_ms.is_some());
    assert_eq!(state.answers.len(), 2);
}

#[tokio::test]
async fn attempts_for_different_tests_do_not_interfere() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(
        SqliteStorage::connect_file(dir.path().join("attempts.db"))
            .await
            .unwrap(),
    );

    let maths = AttemptStateStore::load("maths-1", Arc::clone(&storage)).await;
    let physics = AttemptStateStore::load("physics-1", Arc::clone(&storage)).await;

    maths.start_attempt(META).await;
    maths.save_answer("q1", json!("A")).await;
    physics.start_attempt(META).await;
    physics.save_answer("q1", json!("Z")).await;

    maths.reset().await;

    let physics_state = AttemptStateStore::load("physics-1", storage)
        .await
        .snapshot()
        .await;
    assert!(physics_state.active);
    assert_eq!(physics_state.answers["q1"], json!("Z"));
}

#[test]
fn expired_clock_triggers_auto_submit_decision() {
    let started = 1_700_000_000_000i64;

    // The host's tick handler submits when the derived clock hits zero
    let just_before = remaining(started + 30 * 60_000 - 1_000, Some(started), 30);
    assert!(!just_before.is_expired());

    let at_expiry = remaining(started + 30 * 60_000, Some(started), 30);
    assert!(at_expiry.is_expired());
}

#[derive(Default)]
struct CountingHooks {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

#[async_trait::async_trait]
impl ProctoringHooks for CountingHooks {
    async fn enter_fullscreen(&self) -> Result<(), ProctoringError> {
        Ok(())
    }

    async fn exit_fullscreen(&self) -> Result<(), ProctoringError> {
        Ok(())
    }

    async fn start_media(&self) -> Result<(), ProctoringError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_media(&self) -> Result<(), ProctoringError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn proctoring_wraps_a_full_attempt() {
    let storage = Arc::new(examgate::MemoryStorage::new());
    let store = AttemptStateStore::load("t1", storage).await;

    let hooks = Arc::new(CountingHooks::default());
    let mut coordinator =
        ProctoringLifecycleCoordinator::new(Arc::clone(&hooks), Duration::ZERO);

    // Learner navigates in; capture starts once despite the remount
    coordinator.on_route_change("/student/tests/t1/attempt").await;
    coordinator.on_route_change("/student/tests/t1/attempt").await;
    store.start_attempt(META).await;

    store.save_answer("q1", json!("C")).await;
    store.submit_attempt().await;

    // Leaving the attempt screen tears capture down
    coordinator.on_route_change("/student/tests/t1/results").await;

    assert_eq!(hooks.starts.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.stops.load(Ordering::SeqCst), 1);
    assert!(!store.snapshot().await.active);
}
