//! Upload types for the multipart upload protocol

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default chunk size: 5MB
pub const DEFAULT_CHUNK_SIZE: u32 = 5 * 1024 * 1024;

/// Default number of part uploads kept in flight at once
pub const DEFAULT_CONCURRENCY: usize = 3;

// ============================================================================
// Upload Source
// ============================================================================

/// The file handed to [`MultipartUploader::upload`](super::MultipartUploader::upload).
///
/// Holds the full contents in memory; parts are cheap `Bytes` slices of it.
#[derive(Debug, Clone)]
pub struct UploadSource {
    /// Original file name
    pub file_name: String,

    /// MIME type of the file
    pub content_type: String,

    /// File contents
    pub bytes: Bytes,
}

impl UploadSource {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Total size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// ============================================================================
// Plan Types
// ============================================================================

/// One planned byte range of the file, uploaded as an independent part.
///
/// Part numbers are 1-based and contiguous; the range is `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    pub part_number: u32,
    pub start: u64,
    pub end: u64,
}

impl PartPlan {
    /// Length of the byte range
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// Response envelope used by every upload control endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub success: bool,

    #[serde(default)]
    pub data: Option<T>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Extract the payload, or the server-provided failure message.
    pub fn into_data(self) -> Result<T, String> {
        if self.success {
            self.data
                .ok_or_else(|| "response missing data payload".to_string())
        } else {
            Err(self
                .error
                .or(self.message)
                .unwrap_or_else(|| "request rejected by server".to_string()))
        }
    }
}

/// Request to initiate a multipart upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateUpload {
    /// Original file name
    pub file_name: String,

    /// MIME type of the file
    pub file_type: String,

    /// Total file size in bytes
    pub file_size: u64,

    /// Optional target folder under the bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

/// Server-issued identifiers for an initiated upload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedUpload {
    /// Opaque server-issued upload identifier
    pub upload_id: String,

    /// Target storage key
    pub key: String,

    /// Bucket the object will land in
    #[serde(default)]
    pub bucket: Option<String>,
}

/// Pre-signed URL for one part
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrl {
    pub part_number: u32,
    pub upload_url: String,
}

/// `get-urls` response payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrlsData {
    pub urls: Vec<PartUrl>,

    /// Seconds until the pre-signed URLs expire
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// One finished part, as sent to `complete`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,

    #[serde(rename = "ETag")]
    pub e_tag: String,
}

/// `complete` response payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedUpload {
    pub key: String,
    pub public_url: String,
    pub cdn_url: String,

    #[serde(default)]
    pub bucket: Option<String>,
}

// ============================================================================
// Progress Types
// ============================================================================

/// Lifecycle state of an upload session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// No upload started yet
    Idle,
    /// Calling `initiate`
    Initiating,
    /// Planning parts and fetching pre-signed URLs
    PlanningParts,
    /// Parts in flight
    UploadingParts,
    /// Calling `complete`
    Completing,
    /// Upload finished, CDN URL available
    Completed,
    /// Abort requested, cleanup in progress
    Aborting,
    /// Session aborted
    Aborted,
    /// Session failed
    Failed,
}

impl UploadStatus {
    /// Terminal states admit no further `upload` calls on the session.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Initiating
                | Self::PlanningParts
                | Self::UploadingParts
                | Self::Completing
                | Self::Aborting
        )
    }
}

/// Progress snapshot emitted after every settled part and lifecycle transition.
///
/// Carries raw counters only; throughput and ETA are derived by the caller
/// from deltas between snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub uploaded_chunks: u32,
    pub total_chunks: u32,

    /// Part number that settled most recently (0 before any part settles)
    pub current_chunk: u32,

    /// Rounded percentage of bytes uploaded, clamped to 0..=100
    pub percentage: u8,

    pub status: UploadStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Error Types
// ============================================================================

/// Upload error types
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid upload configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Upload initiation failed: {0}")]
    InitiationFailed(String),

    #[error("Part URL assignment failed: {0}")]
    UrlAssignmentFailed(String),

    #[error("Part {part_number} upload failed: {cause}")]
    PartUploadFailed { part_number: u32, cause: String },

    #[error("Upload completion failed: {0}")]
    CompletionFailed(String),

    #[error("Upload abort failed: {0}")]
    AbortFailed(String),

    #[error("An upload is already in flight on this session")]
    SessionBusy,

    #[error("Upload session already terminated")]
    SessionAlreadyTerminated,

    #[error("Upload aborted")]
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_success_yields_data() {
        let env: ApiEnvelope<InitiatedUpload> = serde_json::from_str(
            r#"{"success":true,"data":{"uploadId":"u1","key":"k1","bucket":"b"},"message":"ok"}"#,
        )
        .unwrap();

        let data = env.into_data().unwrap();
        assert_eq!(data.upload_id, "u1");
        assert_eq!(data.key, "k1");
    }

    #[test]
    fn envelope_failure_yields_server_message() {
        let env: ApiEnvelope<InitiatedUpload> =
            serde_json::from_str(r#"{"success":false,"error":"quota exceeded"}"#).unwrap();

        assert_eq!(env.into_data().unwrap_err(), "quota exceeded");
    }

    #[test]
    fn envelope_deserializes_behind_a_deserialize_only_bound() {
        // The transport unwraps envelopes through exactly this bound; the
        // payload types carry no Default impl, so the envelope must not
        // require one.
        fn parse<T: serde::de::DeserializeOwned>(raw: &str) -> ApiEnvelope<T> {
            serde_json::from_str(raw).unwrap()
        }

        let env: ApiEnvelope<InitiatedUpload> =
            parse(r#"{"success":true,"data":{"uploadId":"u1","key":"k1"}}"#);
        assert_eq!(env.into_data().unwrap().upload_id, "u1");
    }

    #[test]
    fn completed_part_serializes_etag_field() {
        let part = CompletedPart {
            part_number: 3,
            e_tag: "e3".to_string(),
        };
        let json = serde_json::to_string(&part).unwrap();
        assert_eq!(json, r#"{"partNumber":3,"ETag":"e3"}"#);
    }

    #[test]
    fn progress_snapshot_serializes_camel_case() {
        let progress = UploadProgress {
            uploaded_bytes: 512,
            total_bytes: 1024,
            uploaded_chunks: 1,
            total_chunks: 2,
            current_chunk: 1,
            percentage: 50,
            status: UploadStatus::UploadingParts,
            error: None,
        };

        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["uploadedBytes"], 512);
        assert_eq!(json["status"], "uploading_parts");
    }
}
