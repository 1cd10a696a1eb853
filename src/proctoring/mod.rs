//! Proctoring Lifecycle Coordination
//!
//! Starts and stops camera capture and fullscreen mode around the timed
//! attempt screen. The coordinator is a two-boolean state machine
//! (`on_route`, `camera_started`) driven by discrete route-change events, so
//! any host (browser shell, CLI harness, another UI framework) can drive it by
//! feeding path strings. Capture starts at most once per continuous stay on
//! the attempt route, survives remounts, and restarts cleanly on re-entry.

use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Host Capabilities
// ============================================================================

/// Proctoring failures. Capture-start failures reach the host through the
/// error callback; everything else is best-effort and only logged.
#[derive(Debug, thiserror::Error)]
pub enum ProctoringError {
    #[error("Capture start failed: {0}")]
    CaptureStart(String),

    #[error("Fullscreen request failed: {0}")]
    Fullscreen(String),

    #[error("Media device error: {0}")]
    Media(String),
}

/// Capabilities the host environment supplies
#[async_trait::async_trait]
pub trait ProctoringHooks: Send + Sync {
    async fn enter_fullscreen(&self) -> Result<(), ProctoringError>;

    async fn exit_fullscreen(&self) -> Result<(), ProctoringError>;

    /// Request camera/microphone capture start
    async fn start_media(&self) -> Result<(), ProctoringError>;

    async fn stop_media(&self) -> Result<(), ProctoringError>;
}

// Shared hooks delegate, so a host can keep its own handle to the
// capabilities it hands to a coordinator.
#[async_trait::async_trait]
impl<H: ProctoringHooks + ?Sized> ProctoringHooks for Arc<H> {
    async fn enter_fullscreen(&self) -> Result<(), ProctoringError> {
        (**self).enter_fullscreen().await
    }

    async fn exit_fullscreen(&self) -> Result<(), ProctoringError> {
        (**self).exit_fullscreen().await
    }

    async fn start_media(&self) -> Result<(), ProctoringError> {
        (**self).start_media().await
    }

    async fn stop_media(&self) -> Result<(), ProctoringError> {
        (**self).stop_media().await
    }
}

/// Invoked when a capture start fails; never thrown into the route handler
pub type CaptureErrorCallback = Arc<dyn Fn(&ProctoringError) + Send + Sync>;

// ============================================================================
// Route Matching
// ============================================================================

/// Whether a navigable path is the timed-attempt screen
/// (`.../tests/<id>/attempt`). Sub-pages below the attempt segment, like a
/// review screen, are not the attempt itself.
pub fn is_attempt_route(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    matches!(segments.as_slice(), [.., "tests", _, "attempt"])
}

// ============================================================================
// Coordinator
// ============================================================================

/// Reacts to entry/exit of the attempt route, idempotently per stay.
pub struct ProctoringLifecycleCoordinator<H: ProctoringHooks> {
    hooks: Arc<H>,
    settle_delay: Duration,
    on_route: bool,
    camera_started: bool,
    on_capture_error: Option<CaptureErrorCallback>,
}

impl<H: ProctoringHooks> ProctoringLifecycleCoordinator<H> {
    pub fn new(hooks: H, settle_delay: Duration) -> Self {
        Self {
            hooks: Arc::new(hooks),
            settle_delay,
            on_route: false,
            camera_started: false,
            on_capture_error: None,
        }
    }

    /// Register the capture-failure observer
    pub fn with_capture_error(
        mut self,
        callback: impl Fn(&ProctoringError) + Send + Sync + 'static,
    ) -> Self {
        self.on_capture_error = Some(Arc::new(callback));
        self
    }

    pub fn is_on_route(&self) -> bool {
        self.on_route
    }

    pub fn camera_started(&self) -> bool {
        self.camera_started
    }

    /// Feed the current navigable path on every navigation (including
    /// remount-driven re-delivery of the same path).
    pub async fn on_route_change(&mut self, path: &str) {
        let entering = is_attempt_route(path);

        match (self.on_route, entering) {
            (false, true) => {
                self.on_route = true;
                self.begin_session().await;
            }
            // Remounts and re-renders while staying on the route: capture
            // must not restart and fullscreen must not be re-requested.
            (true, true) => {}
            (true, false) => {
                self.on_route = false;
                self.end_session().await;
            }
            (false, false) => {}
        }
    }

    async fn begin_session(&mut self) {
        tracing::info!("Entered attempt route, starting proctoring session");

        if let Err(error) = self.hooks.enter_fullscreen().await {
            tracing::warn!(error = %error, "Fullscreen request failed");
        }

        // Let the fullscreen transition settle before prompting for devices
        tokio::time::sleep(self.settle_delay).await;

        if self.camera_started {
            return;
        }

        // Flag first, so a concurrent re-entry cannot issue a second start
        // while this one is in flight; a failure re-arms the flag for retry.
        self.camera_started = true;
        if let Err(error) = self.hooks.start_media().await {
            self.camera_started = false;
            tracing::warn!(error = %error, "Capture start failed");
            if let Some(callback) = &self.on_capture_error {
                callback(&error);
            }
        }
    }

    async fn end_session(&mut self) {
        tracing::info!("Left attempt route, stopping proctoring session");

        if let Err(error) = self.hooks.stop_media().await {
            tracing::warn!(error = %error, "Capture stop failed");
        }

        // Best-effort: the browser may not be in fullscreen at all
        if let Err(error) = self.hooks.exit_fullscreen().await {
            tracing::debug!(error = %error, "Fullscreen exit failed");
        }

        self.camera_started = false;
    }
}

// ============================================================================
// Tests
// ============================================================================
