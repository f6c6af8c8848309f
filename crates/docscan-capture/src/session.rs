// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture session — the search -> capture -> review state machine.
//
// ```text
// Searching --capture / auto--> Capturing --> Enhancing --> Reviewing
//     ^                                          |              |
//     +------------------ retake ----------------+--------------+
//                                                |              |
//                                             confirm / close --+--> Closed
// ```
//
// Every exit path funnels through `teardown`, which is idempotent and also
// runs on drop.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use docscan_core::error::{Result, ScanError, classify_error};
use docscan_core::guidance::Guidance;
use docscan_core::{Quad, Rotation, ScannerConfig, SessionId};
use docscan_vision::{Frame, ImageProcessor, QualityReport};
use image::DynamicImage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::analyzer::FrameAnalyzer;
use crate::camera::{CameraLease, FrameSource, OrientationSensor};
use crate::engine::EngineHandle;
use crate::loops::{
    CaptureState, LiveContext, LoopHandle, Overlay, lock, spawn_analysis, spawn_tracking,
};
use crate::result::ScanResult;
use crate::tracker::{QuadTracker, TrackerState};

/// The captured page while it is being reviewed.
struct Review {
    corrected: DynamicImage,
    manual_rotation: Rotation,
    device_rotation: Rotation,
    perspective_corrected: bool,
    captured_at: DateTime<Utc>,
}

/// One scanner session, from camera open to confirmed (or abandoned) scan.
pub struct CaptureSession<A: FrameAnalyzer> {
    id: SessionId,
    config: ScannerConfig,
    ctx: Arc<LiveContext<A>>,
    orientation: Arc<dyn OrientationSensor>,
    analysis: Option<LoopHandle>,
    tracking: Option<LoopHandle>,
    review: Option<Review>,
    enhancement: Option<JoinHandle<()>>,
    enhanced: Arc<Mutex<Option<DynamicImage>>>,
    closed: bool,
}

impl<A: FrameAnalyzer> CaptureSession<A> {
    /// Wait for the engine, acquire the camera and start searching.
    ///
    /// Camera failures are returned immediately; there is no retry.
    #[instrument(skip_all)]
    pub async fn open(
        engine: &EngineHandle<A>,
        source: Box<dyn FrameSource>,
        orientation: Arc<dyn OrientationSensor>,
        config: ScannerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let analyzer = engine.wait().await?;
        let camera = CameraLease::acquire(source)?;

        let ctx = Arc::new(LiveContext {
            analyzer,
            camera: Mutex::new(camera),
            tracker: Mutex::new(QuadTracker::new(config.tracker.clone())),
            generation: AtomicU64::new(0),
            busy: Arc::new(AtomicBool::new(false)),
            auto_capture: config.session.auto_capture,
            state: watch::channel(CaptureState::Searching).0,
            raw: watch::channel(None).0,
            overlay: watch::channel(Overlay::default()).0,
            guidance: watch::channel(Guidance::starting()).0,
            report: watch::channel(None).0,
            auto_trigger: watch::channel(false).0,
        });

        let mut session = Self {
            id: SessionId::new(),
            config,
            ctx,
            orientation,
            analysis: None,
            tracking: None,
            review: None,
            enhancement: None,
            enhanced: Arc::new(Mutex::new(None)),
            closed: false,
        };
        session.start_loops();
        info!(session = %session.id, "capture session open");
        Ok(session)
    }

    // -- Accessors ------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> CaptureState {
        self.ctx.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CaptureState> {
        self.ctx.state.subscribe()
    }

    pub fn subscribe_guidance(&self) -> watch::Receiver<Guidance> {
        self.ctx.guidance.subscribe()
    }

    pub fn subscribe_overlay(&self) -> watch::Receiver<Overlay> {
        self.ctx.overlay.subscribe()
    }

    pub fn latest_report(&self) -> Option<QualityReport> {
        self.ctx.report.borrow().clone()
    }

    /// Snapshot of the tracker.
    pub fn tracker_state(&self) -> TrackerState {
        lock(&self.ctx.tracker).state().clone()
    }

    pub fn camera_active(&self) -> bool {
        lock(&self.ctx.camera).is_active()
    }

    /// Manual rotation chosen so far, while reviewing.
    pub fn manual_rotation(&self) -> Option<Rotation> {
        self.review.as_ref().map(|review| review.manual_rotation)
    }

    // -- Searching ------------------------------------------------------------

    /// Resolves once the document has been steady long enough to capture.
    /// Never resolves when auto-capture is disabled.
    pub async fn auto_capture_ready(&self) -> Result<()> {
        let mut rx = self.ctx.auto_trigger.subscribe();
        rx.wait_for(|fired| *fired)
            .await
            .map(|_| ())
            .map_err(|_| ScanError::InvalidState {
                operation: "wait for auto-capture",
                state: self.state().to_string(),
            })
    }

    /// Wait for the auto trigger, then capture.
    pub async fn wait_for_auto_capture(&mut self) -> Result<()> {
        self.auto_capture_ready().await?;
        self.capture().await
    }

    // -- Capturing ------------------------------------------------------------

    /// Freeze the best frame, release the camera and produce the corrected
    /// page. Enhancement continues in the background.
    ///
    /// If this future is dropped before it completes, or no frame can be
    /// frozen, the session goes back to searching with the camera and both
    /// loops running again.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn capture(&mut self) -> Result<()> {
        self.require_state(&[CaptureState::Searching], "capture")?;
        self.ctx.set_state(CaptureState::Capturing);
        self.stop_loops();
        let mut pending = PendingCapture {
            session: self,
            armed: true,
        };

        let Some((frame, quad)) = pending.freeze() else {
            return Err(ScanError::FrameAnalysis("no frame available to capture".into()));
        };
        lock(&pending.ctx.camera).release();

        let device_rotation = pending.orientation.rotation();
        let analyzer = Arc::clone(&pending.ctx.analyzer);
        let min_coverage = pending.config.session.refine_min_coverage;
        let source = Arc::clone(&frame);
        let processed = tokio::task::spawn_blocking(move || {
            correct_and_refine(analyzer.as_ref(), &source, quad.as_ref(), min_coverage)
        })
        .await;

        let (corrected, perspective_corrected) = match processed {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "correction task failed; using uncorrected frame");
                (frame.image.clone(), false)
            }
        };
        let corrected = ImageProcessor::from_dynamic(corrected)
            .rotate(device_rotation)
            .into_dynamic();

        info!(
            sequence = frame.sequence,
            width = corrected.width(),
            height = corrected.height(),
            perspective_corrected,
            ?device_rotation,
            "page captured"
        );

        pending.review = Some(Review {
            corrected: corrected.clone(),
            manual_rotation: Rotation::None,
            device_rotation,
            perspective_corrected,
            captured_at: Utc::now(),
        });
        pending.ctx.set_state(CaptureState::Enhancing);
        pending.spawn_enhancement(corrected);
        pending.armed = false;
        Ok(())
    }

    /// Undo a capture that did not reach review.
    fn abandon_capture(&mut self) {
        if self.closed || self.state() != CaptureState::Capturing {
            return;
        }
        // Loops need a runtime to spawn on.
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("capture abandoned outside the runtime; closing");
            self.teardown();
            return;
        }
        warn!("capture did not complete; searching again");
        if let Err(err) = self.resume_search() {
            debug!(error = %err, "session closed after abandoned capture");
        }
    }

    /// Best frame, else the last analysed frame, else a fresh grab.
    fn freeze(&self) -> Option<(Arc<Frame>, Option<Quad>)> {
        {
            let tracker = lock(&self.ctx.tracker);
            if let Some(best) = tracker.best() {
                debug!(sequence = best.frame.sequence, score = best.score, "using best frame");
                return Some((Arc::clone(&best.frame), Some(best.quad)));
            }
            if let Some(frame) = tracker.state().latest_frame.as_ref() {
                debug!(sequence = frame.sequence, "no best frame; using latest frame");
                return Some((Arc::clone(frame), tracker.state().raw_points));
            }
        }
        match lock(&self.ctx.camera).grab() {
            Ok(frame) => {
                debug!(sequence = frame.sequence, "no analysed frame; grabbed a fresh one");
                Some((Arc::new(frame), None))
            }
            Err(err) => {
                warn!(error = %err, "fresh grab failed");
                None
            }
        }
    }

    fn spawn_enhancement(&mut self, image: DynamicImage) {
        let analyzer = Arc::clone(&self.ctx.analyzer);
        let ctx = Arc::clone(&self.ctx);
        let slot = Arc::clone(&self.enhanced);
        let mode = self.config.session.enhance;
        let generation = ctx.current_generation();
        *lock(&slot) = None;

        let task = tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || analyzer.enhance(image, mode)).await;
            if ctx.current_generation() != generation {
                debug!("stale enhancement discarded");
                return;
            }
            match result {
                Ok(Ok(enhanced)) => {
                    *lock(&slot) = Some(enhanced);
                    info!(?mode, "enhancement ready");
                }
                Ok(Err(err)) => warn!(
                    error = %err,
                    class = ?classify_error(&err),
                    "enhancement failed; keeping corrected image"
                ),
                Err(err) => warn!(error = %err, "enhancement task failed"),
            }
            ctx.state.send_if_modified(|state| {
                if *state == CaptureState::Enhancing {
                    *state = CaptureState::Reviewing;
                    true
                } else {
                    false
                }
            });
        });
        self.enhancement = Some(task);
    }

    fn abort_enhancement(&mut self) {
        if let Some(task) = self.enhancement.take() {
            if !task.is_finished() {
                task.abort();
                debug!("pending enhancement cancelled");
            }
        }
    }

    // -- Reviewing ------------------------------------------------------------

    /// Wait for background enhancement to finish. Returns whether an
    /// enhanced image is available.
    pub async fn settle_enhancement(&mut self) -> bool {
        if let Some(task) = self.enhancement.take() {
            if let Err(err) = task.await {
                debug!(error = %err, "enhancement task did not complete");
            }
        }
        lock(&self.enhanced).is_some()
    }

    /// Quarter turn clockwise. Returns the accumulated manual rotation.
    pub fn rotate_right(&mut self) -> Result<Rotation> {
        let review = self.review_mut("rotate")?;
        review.manual_rotation = review.manual_rotation.turned_right();
        Ok(review.manual_rotation)
    }

    /// Quarter turn counter-clockwise.
    pub fn rotate_left(&mut self) -> Result<Rotation> {
        let review = self.review_mut("rotate")?;
        review.manual_rotation = review.manual_rotation.turned_left();
        Ok(review.manual_rotation)
    }

    /// The page as it would be confirmed right now.
    pub fn preview(&self) -> Result<DynamicImage> {
        let review = self.review.as_ref().ok_or_else(|| ScanError::InvalidState {
            operation: "preview",
            state: self.state().to_string(),
        })?;
        let image = lock(&self.enhanced)
            .clone()
            .unwrap_or_else(|| review.corrected.clone());
        Ok(ImageProcessor::from_dynamic(image)
            .rotate(review.manual_rotation)
            .into_dynamic())
    }

    /// Discard the capture and search again with a clean tracker.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn retake(&mut self) -> Result<()> {
        self.review_mut("retake")?;
        self.abort_enhancement();
        self.ctx.bump_generation();
        self.review = None;
        *lock(&self.enhanced) = None;
        lock(&self.ctx.tracker).reset();
        self.ctx.clear_live_outputs();

        self.resume_search()?;
        info!("retake: searching again");
        Ok(())
    }

    /// Apply the manual rotation, encode and close the session. A pending
    /// enhancement is cancelled rather than awaited.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn confirm(&mut self) -> Result<ScanResult> {
        self.review_mut("confirm")?;
        self.abort_enhancement();

        let review = self.review.as_ref().ok_or_else(|| ScanError::InvalidState {
            operation: "confirm",
            state: self.state().to_string(),
        })?;
        let enhanced = lock(&self.enhanced).clone();
        let applied = enhanced.is_some();
        let image = enhanced.unwrap_or_else(|| review.corrected.clone());
        let processor = ImageProcessor::from_dynamic(image).rotate(review.manual_rotation);
        let jpeg = processor.to_jpeg_bytes(self.config.output.jpeg_quality)?;

        let result = ScanResult {
            session_id: self.id,
            file_name: self.config.output.file_name.clone(),
            jpeg,
            width: processor.width(),
            height: processor.height(),
            manual_rotation: review.manual_rotation,
            device_rotation: review.device_rotation,
            perspective_corrected: review.perspective_corrected,
            enhanced: applied,
            captured_at: review.captured_at,
        };
        info!(
            bytes = result.byte_len(),
            width = result.width,
            height = result.height,
            enhanced = applied,
            "scan confirmed"
        );

        self.teardown();
        Ok(result)
    }

    // -- Closing --------------------------------------------------------------

    pub fn close(&mut self) {
        self.teardown();
    }

    /// Stop everything and release every resource. Safe to call repeatedly.
    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stop_loops();
        self.abort_enhancement();
        lock(&self.ctx.camera).release();
        lock(&self.ctx.tracker).reset();
        self.review = None;
        *lock(&self.enhanced) = None;
        self.ctx.clear_live_outputs();
        self.ctx.set_state(CaptureState::Closed);
        info!(session = %self.id, "capture session closed");
    }

    // -- Internals ------------------------------------------------------------

    /// Re-acquire the camera and restart both loops. A camera that cannot
    /// be had back closes the session.
    fn resume_search(&mut self) -> Result<()> {
        let resumed = lock(&self.ctx.camera).resume();
        if let Err(err) = resumed {
            warn!(
                error = %err,
                class = ?classify_error(&err),
                "camera could not be re-acquired"
            );
            self.teardown();
            return Err(err);
        }
        self.ctx.set_state(CaptureState::Searching);
        self.start_loops();
        Ok(())
    }

    fn start_loops(&mut self) {
        let session = &self.config.session;
        self.analysis = Some(spawn_analysis(Arc::clone(&self.ctx), session.analysis_interval()));
        self.tracking = Some(spawn_tracking(Arc::clone(&self.ctx), session.tracking_interval()));
    }

    /// Invalidate in-flight work, then signal and abort both loops.
    fn stop_loops(&mut self) {
        self.ctx.bump_generation();
        if let Some(mut handle) = self.analysis.take() {
            handle.stop();
        }
        if let Some(mut handle) = self.tracking.take() {
            handle.stop();
        }
    }

    fn require_state(&self, allowed: &[CaptureState], operation: &'static str) -> Result<()> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(ScanError::InvalidState {
                operation,
                state: state.to_string(),
            })
        }
    }

    fn review_mut(&mut self, operation: &'static str) -> Result<&mut Review> {
        let state = self.ctx.state();
        match (state, self.review.as_mut()) {
            (CaptureState::Reviewing | CaptureState::Enhancing, Some(review)) => Ok(review),
            _ => Err(ScanError::InvalidState {
                operation,
                state: state.to_string(),
            }),
        }
    }
}

impl<A: FrameAnalyzer> Drop for CaptureSession<A> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// A capture in progress. Dropped while still armed, it hands the session
/// back to the search loops.
struct PendingCapture<'a, A: FrameAnalyzer> {
    session: &'a mut CaptureSession<A>,
    armed: bool,
}

impl<A: FrameAnalyzer> std::ops::Deref for PendingCapture<'_, A> {
    type Target = CaptureSession<A>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<A: FrameAnalyzer> std::ops::DerefMut for PendingCapture<'_, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<A: FrameAnalyzer> Drop for PendingCapture<'_, A> {
    fn drop(&mut self) {
        if self.armed {
            self.session.abandon_capture();
        }
    }
}

/// Warp the frame to the quad, then try once more on the corrected image:
/// if the page is found again covering at least `min_coverage` of it, the
/// tighter crop wins. Any failure falls back to the previous image.
fn correct_and_refine<A: FrameAnalyzer>(
    analyzer: &A,
    frame: &Frame,
    quad: Option<&Quad>,
    min_coverage: f32,
) -> (DynamicImage, bool) {
    let Some(quad) = quad else {
        return (frame.image.clone(), false);
    };
    let corrected = match analyzer.correct(&frame.image, quad) {
        Ok(corrected) => corrected,
        Err(err) => {
            warn!(
                error = %err,
                class = ?classify_error(&err),
                "perspective correction failed; using uncorrected frame"
            );
            return (frame.image.clone(), false);
        }
    };

    let Some(inner) = analyzer.redetect(&corrected) else {
        return (corrected, true);
    };
    let total = corrected.width() as f32 * corrected.height() as f32;
    let coverage = if total > 0.0 { inner.area() / total } else { 0.0 };
    if coverage < min_coverage {
        debug!(coverage, "re-detected page too small; keeping first correction");
        return (corrected, true);
    }

    match analyzer.correct(&corrected, &Quad::from_points(inner.corners)) {
        Ok(refined) => {
            debug!(coverage, "refined crop applied");
            (refined, true)
        }
        Err(err) => {
            debug!(
                error = %err,
                class = ?classify_error(&err),
                "refinement failed; keeping first correction"
            );
            (corrected, true)
        }
    }
}
