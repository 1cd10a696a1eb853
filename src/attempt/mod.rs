//! Durable Exam Attempt Session
//!
//! The timed-attempt engine behind a proctored test screen:
//! - [`AttemptStateStore`]: per-test session state (start, answers, submit)
//!   persisted through a pluggable key-value port after every mutation
//! - [`clock::remaining`]: remaining time derived from the fixed start
//!   timestamp, plus a restartable 1-second tick source
//!
//! Durability is best-effort: storage corruption degrades to a fresh attempt
//! and write failures leave the in-memory state authoritative.

pub mod clock;
pub mod storage;
pub mod store;

pub use clock::{remaining, RemainingTime, SecondTicker};
pub use storage::{AttemptStorage, MemoryStorage, SqliteStorage, StorageError};
pub use store::{AttemptMeta, AttemptState, AttemptStateStore};
