//! Upload transport
//!
//! The five remote operations a multipart upload needs, behind a trait so the
//! uploader can be driven by an HTTP backend or an in-memory fake. The
//! transport owns no session state and never retries; retry policy belongs to
//! the caller.

use bytes::Bytes;

use super::types::{
    ApiEnvelope, CompletedPart, CompletedUpload, InitiateUpload, InitiatedUpload, PartUrl,
    PartUrlsData, UploadError,
};

// ============================================================================
// Transport Trait
// ============================================================================

/// Remote operations for a multipart upload
#[async_trait::async_trait]
pub trait UploadTransport: Send + Sync {
    /// Initiate an upload, obtaining the server-issued upload id and object key
    async fn initiate(&self, request: &InitiateUpload) -> Result<InitiatedUpload, UploadError>;

    /// Fetch one pre-signed URL per part.
    ///
    /// The response may arrive in any order; callers match entries to the plan
    /// by `part_number`, never by position.
    async fn part_urls(
        &self,
        upload_id: &str,
        key: &str,
        total_parts: u32,
    ) -> Result<Vec<PartUrl>, UploadError>;

    /// Transfer one part's bytes to its pre-signed URL, returning the eTag
    async fn upload_part(
        &self,
        part_number: u32,
        upload_url: &str,
        body: Bytes,
    ) -> Result<String, UploadError>;

    /// Finalize the upload from the ordered part/eTag list
    async fn complete(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<CompletedUpload, UploadError>;

    /// Abandon the upload server-side
    async fn abort(&self, upload_id: &str, key: &str) -> Result<(), UploadError>;
}

// Shared transports delegate, so callers can keep their own handle to a
// transport they hand to an uploader.
#[async_trait::async_trait]
impl<T: UploadTransport + ?Sized> UploadTransport for std::sync::Arc<T> {
    async fn initiate(&self, request: &InitiateUpload) -> Result<InitiatedUpload, UploadError> {
        (**self).initiate(request).await
    }

    async fn part_urls(
        &self,
        upload_id: &str,
        key: &str,
        total_parts: u32,
    ) -> Result<Vec<PartUrl>, UploadError> {
        (**self).part_urls(upload_id, key, total_parts).await
    }

    async fn upload_part(
        &self,
        part_number: u32,
        upload_url: &str,
        body: Bytes,
    ) -> Result<String, UploadError> {
        (**self).upload_part(part_number, upload_url, body).await
    }

    async fn complete(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<CompletedUpload, UploadError> {
        (**self).complete(upload_id, key, parts).await
    }

    async fn abort(&self, upload_id: &str, key: &str) -> Result<(), UploadError> {
        (**self).abort(upload_id, key).await
    }
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// HTTP implementation of the upload wire contract.
///
/// Control endpoints live under a single base URL and respond with the
/// `{success, data, message}` envelope; part bytes go straight to the
/// pre-signed URL via `PUT`.
#[derive(Clone)]
pub struct HttpUploadTransport {
    http: reqwest::Client,
    base_url: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PartUrlsRequest<'a> {
    upload_id: &'a str,
    key: &'a str,
    total_parts: u32,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteRequest<'a> {
    upload_id: &'a str,
    key: &'a str,
    parts: &'a [CompletedPart],
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct AbortRequest<'a> {
    upload_id: &'a str,
    key: &'a str,
}

impl HttpUploadTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Use a pre-configured client (e.g. one carrying timeouts or auth headers)
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// POST a JSON body and unwrap the response envelope
    async fn post_enveloped<B, T>(&self, path: &str, body: &B) -> Result<T, String>
    where
        B: serde::Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("server responded with {}", status));
        }

        let envelope: ApiEnvelope<T> = response.json().await.map_err(|e| e.to_string())?;
        envelope.into_data()
    }
}

#[async_trait::async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn initiate(&self, request: &InitiateUpload) -> Result<InitiatedUpload, UploadError> {
        self.post_enveloped("initiate", request)
            .await
            .map_err(UploadError::InitiationFailed)
    }

    async fn part_urls(
        &self,
        upload_id: &str,
        key: &str,
        total_parts: u32,
    ) -> Result<Vec<PartUrl>, UploadError> {
        let request = PartUrlsRequest {
            upload_id,
            key,
            total_parts,
        };

        let data: PartUrlsData = self
            .post_enveloped("get-urls", &request)
            .await
            .map_err(UploadError::UrlAssignmentFailed)?;

        Ok(data.urls)
    }

    async fn upload_part(
        &self,
        part_number: u32,
        upload_url: &str,
        body: Bytes,
    ) -> Result<String, UploadError> {
        let failed = |cause: String| UploadError::PartUploadFailed { part_number, cause };

        let response = self
            .http
            .put(upload_url)
            .body(body)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("server responded with {}", status)));
        }

        let e_tag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string())
            .ok_or_else(|| failed("response missing ETag header".to_string()))?;

        Ok(e_tag)
    }

    async fn complete(
        &self,
        upload_id: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<CompletedUpload, UploadError> {
        let request = CompleteRequest {
            upload_id,
            key,
            parts,
        };

        self.post_enveloped("complete", &request)
            .await
            .map_err(UploadError::CompletionFailed)
    }

    async fn abort(&self, upload_id: &str, key: &str) -> Result<(), UploadError> {
        let request = AbortRequest { upload_id, key };

        // The abort payload carries only a confirmation message
        let _: serde_json::Value = self
            .post_enveloped("abort", &request)
            .await
            .map_err(UploadError::AbortFailed)?;

        Ok(())
    }
}
