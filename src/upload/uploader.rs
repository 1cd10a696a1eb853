//! Multipart upload orchestration
//!
//! Drives one upload session through its lifecycle:
//! `Idle -> Initiating -> PlanningParts -> UploadingParts -> Completing -> Completed`,
//! with `Aborting`/`Aborted` reachable once an abort is requested and `Failed`
//! reachable from any in-flight state.
//!
//! Parts are uploaded with bounded concurrency: up to the configured width of
//! part uploads are kept in flight at once, dispatched in ascending part-number
//! order. Completion order is unconstrained; the part list handed to
//! `complete` is re-sorted so the non-determinism never leaks into the wire
//! protocol.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::config::UploadConfig;

use super::planner;
use super::transport::UploadTransport;
use super::types::{
    CompletedPart, InitiateUpload, PartPlan, UploadError, UploadProgress, UploadSource,
    UploadStatus,
};

/// Progress observer invoked after every settled part and lifecycle transition
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

#[derive(Debug, Clone)]
struct SessionIds {
    upload_id: String,
    key: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    uploaded_bytes: u64,
    total_bytes: u64,
    uploaded_chunks: u32,
    total_chunks: u32,
    current_chunk: u32,
}

enum PartOutcome {
    Done {
        part_number: u32,
        e_tag: String,
        len: u64,
    },
    Failed {
        part_number: u32,
        error: UploadError,
    },
    Cancelled,
}

// ============================================================================
// Uploader
// ============================================================================

/// Orchestrates one multipart upload session.
///
/// An uploader owns exactly one session: a second `upload` while one is in
/// flight fails with [`UploadError::SessionBusy`], and any call after the
/// session reaches a terminal state fails with
/// [`UploadError::SessionAlreadyTerminated`]. Retrying means constructing a
/// new uploader; the core never retries on its own.
pub struct MultipartUploader<T: UploadTransport> {
    transport: Arc<T>,
    config: UploadConfig,
    status: Mutex<UploadStatus>,
    counters: Mutex<Counters>,
    session: Mutex<Option<SessionIds>>,
    cancel: watch::Sender<bool>,
    on_progress: Mutex<Option<ProgressCallback>>,
}

impl<T: UploadTransport> MultipartUploader<T> {
    pub fn new(transport: T, config: UploadConfig) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            transport: Arc::new(transport),
            config,
            status: Mutex::new(UploadStatus::Idle),
            counters: Mutex::new(Counters::default()),
            session: Mutex::new(None),
            cancel,
            on_progress: Mutex::new(None),
        }
    }

    /// Register the progress observer
    pub fn with_progress(self, callback: impl Fn(UploadProgress) + Send + Sync + 'static) -> Self {
        *self.on_progress.lock() = Some(Arc::new(callback));
        self
    }

    /// Current lifecycle state
    pub fn status(&self) -> UploadStatus {
        *self.status.lock()
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Upload the file, returning its CDN URL.
    pub async fn upload(&self, file: UploadSource) -> Result<String, UploadError> {
        {
            let mut status = self.status.lock();
            if status.is_terminal() {
                return Err(UploadError::SessionAlreadyTerminated);
            }
            if status.is_in_flight() {
                return Err(UploadError::SessionBusy);
            }
            *status = UploadStatus::Initiating;
        }
        {
            let mut counters = self.counters.lock();
            *counters = Counters {
                total_bytes: file.size(),
                ..Counters::default()
            };
        }
        self.emit(None);

        match self.run_upload(&file).await {
            Ok(cdn_url) => Ok(cdn_url),
            // Status transitions for an abort belong to `abort()`
            Err(UploadError::Aborted) => Err(UploadError::Aborted),
            Err(error) => {
                self.set_status(UploadStatus::Failed);
                self.emit(Some(error.to_string()));
                tracing::warn!(error = %error, "Upload failed");
                Err(error)
            }
        }
    }

    async fn run_upload(&self, file: &UploadSource) -> Result<String, UploadError> {
        let initiated = self
            .transport
            .initiate(&InitiateUpload {
                file_name: file.file_name.clone(),
                file_type: file.content_type.clone(),
                file_size: file.size(),
                folder: self.config.folder.clone(),
            })
            .await?;

        let ids = SessionIds {
            upload_id: initiated.upload_id,
            key: initiated.key,
        };
        *self.session.lock() = Some(ids.clone());

        tracing::info!(
            upload_id = %ids.upload_id,
            key = %ids.key,
            file_name = %file.file_name,
            file_size = file.size(),
            "Upload initiated"
        );

        if self.is_cancelled() {
            return Err(UploadError::Aborted);
        }

        self.set_status(UploadStatus::PlanningParts);
        self.emit(None);

        let plan = planner::plan(file.size(), self.config.chunk_size_bytes)?;
        self.counters.lock().total_chunks = plan.len() as u32;

        let urls = self
            .transport
            .part_urls(&ids.upload_id, &ids.key, plan.len() as u32)
            .await?;

        // Match URLs to the plan by part number; the transport is free to
        // reorder its response.
        let mut url_by_part: HashMap<u32, String> = urls
            .into_iter()
            .map(|u| (u.part_number, u.upload_url))
            .collect();

        let assigned: Vec<(PartPlan, String)> = plan
            .iter()
            .map(|part| {
                url_by_part
                    .remove(&part.part_number)
                    .map(|url| (*part, url))
                    .ok_or_else(|| {
                        UploadError::UrlAssignmentFailed(format!(
                            "no URL assigned for part {}",
                            part.part_number
                        ))
                    })
            })
            .collect::<Result<_, _>>()?;

        if self.is_cancelled() {
            return Err(UploadError::Aborted);
        }

        self.set_status(UploadStatus::UploadingParts);
        self.emit(None);

        let mut completed = self.upload_parts(file, assigned).await?;

        if self.is_cancelled() {
            return Err(UploadError::Aborted);
        }

        self.set_status(UploadStatus::Completing);
        self.emit(None);

        // Completion order is non-deterministic under concurrency; the wire
        // contract wants ascending part numbers.
        completed.sort_by_key(|part| part.part_number);

        let done = self
            .transport
            .complete(&ids.upload_id, &ids.key, &completed)
            .await?;

        self.set_status(UploadStatus::Completed);
        self.emit(None);

        tracing::info!(
            upload_id = %ids.upload_id,
            key = %ids.key,
            cdn_url = %done.cdn_url,
            "Upload completed"
        );

        Ok(done.cdn_url)
    }

    /// Upload all planned parts with a bounded in-flight window.
    ///
    /// A part failure does not cancel siblings already in flight, but no new
    /// parts are dispatched once a failure (or an abort) is observed; the
    /// first failure is surfaced after every dispatched part settles.
    async fn upload_parts(
        &self,
        file: &UploadSource,
        assigned: Vec<(PartPlan, String)>,
    ) -> Result<Vec<CompletedPart>, UploadError> {
        let width = self.config.concurrency.max(1);
        let mut queue = assigned.into_iter();
        let mut in_flight = FuturesUnordered::new();
        let mut completed = Vec::new();
        let mut first_failure: Option<UploadError> = None;

        for _ in 0..width {
            if let Some((part, url)) = queue.next() {
                in_flight.push(self.run_part(part, url, slice_part(&file.bytes, part)));
            }
        }

        while let Some(outcome) = in_flight.next().await {
            match outcome {
                PartOutcome::Done {
                    part_number,
                    e_tag,
                    len,
                } => {
                    {
                        let mut counters = self.counters.lock();
                        counters.uploaded_bytes += len;
                        counters.uploaded_chunks += 1;
                        counters.current_chunk = part_number;
                    }
                    completed.push(CompletedPart { part_number, e_tag });
                    self.emit(None);

                    if first_failure.is_none() && !self.is_cancelled() {
                        if let Some((part, url)) = queue.next() {
                            in_flight.push(self.run_part(part, url, slice_part(&file.bytes, part)));
                        }
                    }
                }
                PartOutcome::Failed { part_number, error } => {
                    self.counters.lock().current_chunk = part_number;
                    tracing::warn!(part_number, error = %error, "Part upload failed");
                    self.emit(Some(error.to_string()));
                    first_failure.get_or_insert(error);
                }
                PartOutcome::Cancelled => {}
            }
        }

        if self.is_cancelled() {
            return Err(UploadError::Aborted);
        }
        if let Some(error) = first_failure {
            return Err(error);
        }
        Ok(completed)
    }

    fn run_part(
        &self,
        part: PartPlan,
        url: String,
        body: Bytes,
    ) -> impl Future<Output = PartOutcome> + Send {
        let transport = Arc::clone(&self.transport);
        let mut cancel = self.cancel.subscribe();

        async move {
            let cancelled = async move {
                // Resolves only once the abort signal fires; if the sender is
                // gone without a signal, the race below must fall to the
                // transport side.
                if cancel.wait_for(|flagged| *flagged).await.is_err() {
                    std::future::pending::<()>().await;
                }
            };

            tokio::select! {
                biased;
                _ = cancelled => PartOutcome::Cancelled,
                result = transport.upload_part(part.part_number, &url, body) => match result {
                    Ok(e_tag) => PartOutcome::Done {
                        part_number: part.part_number,
                        e_tag,
                        len: part.len(),
                    },
                    Err(error) => PartOutcome::Failed {
                        part_number: part.part_number,
                        error,
                    },
                },
            }
        }
    }

    // ========================================================================
    // Abort
    // ========================================================================

    /// Abort the session.
    ///
    /// Cancels not-yet-settled part uploads, calls the transport's `abort`
    /// best-effort (its failure is logged, never propagated), and leaves the
    /// session terminally `Aborted`.
    pub async fn abort(&self) -> Result<(), UploadError> {
        {
            let mut status = self.status.lock();
            if status.is_terminal() {
                return Err(UploadError::SessionAlreadyTerminated);
            }
            *status = UploadStatus::Aborting;
        }
        self.emit(None);

        // Stops further dispatch and races down in-flight part transfers
        let _ = self.cancel.send(true);

        let session = self.session.lock().clone();
        if let Some(ids) = session {
            if let Err(error) = self.transport.abort(&ids.upload_id, &ids.key).await {
                tracing::warn!(
                    upload_id = %ids.upload_id,
                    error = %error,
                    "Best-effort upload abort failed"
                );
            }
        }

        self.set_status(UploadStatus::Aborted);
        self.emit(None);
        tracing::info!("Upload session aborted");
        Ok(())
    }

    // ========================================================================
    // Progress
    // ========================================================================

    fn set_status(&self, status: UploadStatus) {
        *self.status.lock() = status;
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn emit(&self, error: Option<String>) {
        let counters = *self.counters.lock();
        let status = self.status();
        let snapshot = UploadProgress {
            uploaded_bytes: counters.uploaded_bytes,
            total_bytes: counters.total_bytes,
            uploaded_chunks: counters.uploaded_chunks,
            total_chunks: counters.total_chunks,
            current_chunk: counters.current_chunk,
            percentage: percentage(
                counters.uploaded_bytes,
                counters.total_bytes,
                counters.uploaded_chunks,
            ),
            status,
            error,
        };

        tracing::debug!(
            status = ?snapshot.status,
            percentage = snapshot.percentage,
            uploaded_chunks = snapshot.uploaded_chunks,
            "Upload progress"
        );

        let callback = self.on_progress.lock().clone();
        if let Some(callback) = callback {
            callback(snapshot);
        }
    }
}

fn slice_part(bytes: &Bytes, part: PartPlan) -> Bytes {
    bytes.slice(part.start as usize..part.end as usize)
}

/// Rounded byte percentage, clamped to 0..=100.
///
/// A zero-byte file has no byte progress to measure; it reads 100 as soon as
/// its single empty part has settled.
fn percentage(uploaded: u64, total: u64, chunks_done: u32) -> u8 {
    if total == 0 {
        return if chunks_done > 0 { 100 } else { 0 };
    }
    ((uploaded as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

// ============================================================================
// Tests
// ============================================================================
