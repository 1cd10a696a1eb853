//! Configuration management

use serde::Deserialize;
use std::env;

use crate::upload::types::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};

/// Default settling delay between fullscreen entry and the capture prompt
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub upload: UploadConfig,
    pub proctoring: ProctoringConfig,
}

/// Upload client configuration.
///
/// Chunk size and concurrency width are injected configuration, not fixed
/// constants; hosts tune them to their network environment.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Base URL of the upload control endpoints
    pub base_url: String,

    pub chunk_size_bytes: u32,

    /// Number of part uploads kept in flight at once
    pub concurrency: usize,

    /// Optional target folder under the bucket
    pub folder: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProctoringConfig {
    pub camera_settle_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            base_url: "http://localhost:3000/api/v1/uploads".to_string(),
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            folder: None,
        }
    }
}

impl Default for ProctoringConfig {
    fn default() -> Self {
        ProctoringConfig {
            camera_settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = UploadConfig::default();

        Config {
            upload: UploadConfig {
                base_url: env::var("UPLOAD_BASE_URL").unwrap_or(defaults.base_url),
                chunk_size_bytes: env::var("UPLOAD_CHUNK_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.chunk_size_bytes),
                concurrency: env::var("UPLOAD_CONCURRENCY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.concurrency),
                folder: env::var("UPLOAD_FOLDER").ok(),
            },
            proctoring: ProctoringConfig {
                camera_settle_delay_ms: env::var("PROCTOR_SETTLE_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            },
        }
    }
}
