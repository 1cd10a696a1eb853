//! examgate
//!
//! The engine room of a proctored test-taking platform. Everything here must
//! survive real failure modes (network interruption, tab reload, clock drift,
//! partial completion) while the presentational layers above stay thin.
//!
//! # Modules
//!
//! - `upload`: resumable multipart upload client (chunk planning, bounded
//!   concurrency, cancellation, progress reporting)
//! - `attempt`: durable exam attempt session (timer, answer persistence)
//! - `proctoring`: camera/fullscreen lifecycle around the attempt route
//! - `config`: injected configuration with env overrides

pub mod attempt;
pub mod config;
pub mod proctoring;
pub mod upload;

pub use attempt::{
    remaining, AttemptMeta, AttemptState, AttemptStateStore, AttemptStorage, MemoryStorage,
    RemainingTime, SecondTicker, SqliteStorage,
};
pub use config::{Config, ProctoringConfig, UploadConfig};
pub use proctoring::{
    is_attempt_route, ProctoringError, ProctoringHooks, ProctoringLifecycleCoordinator,
};
pub use upload::{
    HttpUploadTransport, MultipartUploader, UploadError, UploadProgress, UploadSource,
    UploadStatus, UploadTransport,
};
