//! Resumable Multipart Upload Client
//!
//! Client side of a pre-signed-URL multipart upload:
//! - Deterministic chunk planning from file size and configured chunk size
//! - Bounded-concurrency part uploads with per-part progress
//! - Cancellation (best-effort, including in-flight transfers)
//!
//! Protocol flow:
//! 1. `initiate` obtains the server-issued upload id and object key
//! 2. `get-urls` hands back one pre-signed URL per planned part
//! 3. Each part is `PUT` to its URL; the response `ETag` identifies it
//! 4. `complete` finalizes from the ascending `{partNumber, ETag}` list

pub mod planner;
pub mod transport;
pub mod types;
pub mod uploader;

pub use transport::{HttpUploadTransport, UploadTransport};
pub use types::*;
pub use uploader::{MultipartUploader, ProgressCallback};
