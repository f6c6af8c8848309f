// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end session flows against a scripted analyzer and a counting
// camera.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use docscan_capture::{
    CaptureSession, CaptureState, EngineHandle, FixedOrientation, FrameAnalyzer, FrameSource,
    Overlay, ScanResult, UnavailableCamera,
};
use docscan_core::error::{Result, ScanError};
use docscan_core::guidance::{Guidance, READY_MESSAGE};
use docscan_core::{
    EnhanceMode, QualityThresholds, Quad, Rotation, ScannerConfig, Severity, TiltRatios,
};
use docscan_vision::quality::FrameMetrics;
use docscan_vision::synthetic::render_page;
use docscan_vision::{Evaluation, Frame, QualityReport, VisionEngine};
use image::{DynamicImage, GrayImage};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
// Real image analysis is slow in unoptimised builds.
const VISION_WAIT: Duration = Duration::from_secs(60);

fn page() -> Quad {
    Quad::from_rect(170.0, 40.0, 300.0, 400.0)
}

fn fast_config() -> ScannerConfig {
    let mut config = ScannerConfig::default();
    config.session.analysis_interval_ms = 5;
    config.session.tracking_interval_ms = 2;
    config
}

#[derive(Clone, Copy)]
enum Script {
    Valid,
    Tilted,
    Empty,
    /// Valid page that shifts sideways a little on every frame.
    Drifting,
}

/// Returns canned evaluations; correction crops the quad's bounding box.
struct ScriptedAnalyzer {
    script: Script,
    /// Share of the corrected image the page is found to cover again.
    refound: Option<f32>,
    failing_correction: bool,
    correction_delay: Duration,
    evaluated: AtomicU32,
}

impl ScriptedAnalyzer {
    fn new(script: Script) -> Self {
        Self {
            script,
            refound: None,
            failing_correction: false,
            correction_delay: Duration::ZERO,
            evaluated: AtomicU32::new(0),
        }
    }
}

impl FrameAnalyzer for ScriptedAnalyzer {
    fn evaluate(&self, _image: &DynamicImage, _previous: Option<&Quad>) -> Result<Evaluation> {
        let count = self.evaluated.fetch_add(1, Ordering::SeqCst);
        let quad = match self.script {
            Script::Empty => None,
            Script::Valid | Script::Tilted => Some(page()),
            Script::Drifting => Some(Quad::from_rect(
                170.0 + (count % 10) as f32 * 4.0,
                40.0,
                300.0,
                400.0,
            )),
        };
        let tilt = match self.script {
            Script::Tilted => 1.3,
            _ => 1.0,
        };
        let metrics = FrameMetrics {
            blur_score: 900.0,
            brightness: 140.0,
            contrast: 50.0,
            document: quad.is_some(),
            shadow_delta: quad.map(|_| 5.0),
            min_tile_sharpness: quad.map(|_| 900.0),
            tilt: quad.map(|_| TiltRatios {
                width_ratio: tilt,
                height_ratio: 1.0,
            }),
            cutoff: false,
        };
        Ok(Evaluation {
            report: QualityReport::from_metrics(&metrics, &QualityThresholds::live()),
            quad,
            detected_area: quad.map_or(0.0, |q| q.area() as f64),
        })
    }

    fn redetect(&self, image: &DynamicImage) -> Option<Quad> {
        let side = self.refound?.sqrt();
        let (width, height) = (image.width() as f32, image.height() as f32);
        Some(Quad::from_rect(
            width * (1.0 - side) / 2.0,
            height * (1.0 - side) / 2.0,
            width * side,
            height * side,
        ))
    }

    fn correct(&self, image: &DynamicImage, quad: &Quad) -> Result<DynamicImage> {
        std::thread::sleep(self.correction_delay);
        if self.failing_correction {
            return Err(ScanError::DegenerateQuad("corners collapsed".into()));
        }
        let (x0, y0, x1, y1) = quad.bounds();
        Ok(image.crop_imm(
            x0 as u32,
            y0 as u32,
            (x1 - x0).max(1.0) as u32,
            (y1 - y0).max(1.0) as u32,
        ))
    }

    fn enhance(&self, image: DynamicImage, _mode: EnhanceMode) -> Result<DynamicImage> {
        Ok(image)
    }
}

/// Blank 640x480 frames; counts how often the device was started and stopped.
#[derive(Clone, Default)]
struct CountingCamera {
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    /// Once set, every grab fails as if access had been withdrawn.
    revoked: Arc<AtomicBool>,
    sequence: u64,
}

impl CountingCamera {
    fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl FrameSource for CountingCamera {
    fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(ScanError::PermissionDenied);
        }
        self.sequence += 1;
        Ok(Frame::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(640, 480, image::Luma([200]))),
            self.sequence,
        ))
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

async fn open(
    script: Script,
    camera: &CountingCamera,
    config: ScannerConfig,
) -> CaptureSession<ScriptedAnalyzer> {
    open_with(ScriptedAnalyzer::new(script), camera, config, Rotation::None).await
}

async fn open_with(
    analyzer: ScriptedAnalyzer,
    camera: &CountingCamera,
    config: ScannerConfig,
    device: Rotation,
) -> CaptureSession<ScriptedAnalyzer> {
    let engine = EngineHandle::ready(analyzer);
    CaptureSession::open(
        &engine,
        Box::new(camera.clone()),
        Arc::new(FixedOrientation(device)),
        config,
    )
    .await
    .expect("session opens")
}

fn manual_config() -> ScannerConfig {
    let mut config = fast_config();
    config.session.auto_capture = false;
    config
}

/// Open, wait for the first guidance, capture by hand and confirm.
async fn capture_once(analyzer: ScriptedAnalyzer, device: Rotation) -> ScanResult {
    let camera = CountingCamera::default();
    let mut session = open_with(analyzer, &camera, manual_config(), device).await;
    let mut guidance = session.subscribe_guidance();
    timeout(WAIT, guidance.wait_for(|g| g.message != Guidance::starting().message))
        .await
        .expect("guidance published")
        .expect("session alive");

    session.capture().await.expect("capture");
    session.settle_enhancement().await;
    session.confirm().expect("confirm")
}

#[tokio::test]
async fn steady_document_auto_captures_and_confirms() {
    let camera = CountingCamera::default();
    let mut session = open(Script::Valid, &camera, fast_config()).await;
    assert_eq!(session.state(), CaptureState::Searching);

    timeout(WAIT, session.wait_for_auto_capture())
        .await
        .expect("auto-capture fires")
        .expect("capture succeeds");

    assert!(matches!(
        session.state(),
        CaptureState::Enhancing | CaptureState::Reviewing
    ));
    assert!(!session.camera_active());
    assert_eq!(camera.stops(), 1);

    assert!(session.settle_enhancement().await);
    assert_eq!(session.state(), CaptureState::Reviewing);

    let result = session.confirm().expect("confirm");
    assert_eq!(&result.jpeg[..2], &[0xFF, 0xD8]);
    assert_eq!(result.file_name, "scanned_doc.jpg");
    assert_eq!(result.session_id, session.id());
    assert!(result.perspective_corrected);
    assert!(result.enhanced);
    // Padded crop of the page, not the whole frame.
    assert!(result.width < 640 && result.height <= 480);

    assert_eq!(session.state(), CaptureState::Closed);
    assert_eq!(camera.stops(), 1);
}

#[tokio::test]
async fn tilted_page_guides_and_never_steadies() {
    let camera = CountingCamera::default();
    let session = open(Script::Tilted, &camera, fast_config()).await;

    let mut guidance = session.subscribe_guidance();
    timeout(
        WAIT,
        guidance.wait_for(|g| g.message == "Hold Phone Parallel to Paper"),
    )
    .await
    .expect("tilt guidance published")
    .expect("session alive");

    assert_eq!(session.tracker_state().steady_count, 0);
    assert!(
        timeout(Duration::from_millis(150), session.auto_capture_ready())
            .await
            .is_err()
    );
    let report = session.latest_report().expect("report published");
    assert!(!report.is_valid);
}

#[tokio::test]
async fn manual_capture_without_document_keeps_whole_frame() {
    let camera = CountingCamera::default();
    let mut config = fast_config();
    config.session.auto_capture = false;
    let mut session = open(Script::Empty, &camera, config).await;

    let mut guidance = session.subscribe_guidance();
    timeout(WAIT, guidance.wait_for(|g| g.message == "No Document Detected"))
        .await
        .expect("guidance published")
        .expect("session alive");

    session.capture().await.expect("capture");
    session.settle_enhancement().await;
    let result = session.confirm().expect("confirm");
    assert!(!result.perspective_corrected);
    assert_eq!((result.width, result.height), (640, 480));
}

#[tokio::test]
async fn retake_resets_tracker_and_restarts_camera() {
    let camera = CountingCamera::default();
    let mut session = open(Script::Valid, &camera, fast_config()).await;

    timeout(WAIT, session.wait_for_auto_capture())
        .await
        .expect("auto-capture fires")
        .expect("capture succeeds");
    assert_eq!(camera.starts(), 1);

    session.retake().expect("retake");
    assert_eq!(session.state(), CaptureState::Searching);
    assert!(session.camera_active());
    assert_eq!(camera.starts(), 2);
    assert!(session.manual_rotation().is_none());

    // Searching again from a clean slate reaches a second capture.
    timeout(WAIT, session.wait_for_auto_capture())
        .await
        .expect("auto-capture fires again")
        .expect("capture succeeds");
    assert_eq!(camera.stops(), 2);
}

#[tokio::test]
async fn manual_rotation_swaps_output_dimensions() {
    let camera = CountingCamera::default();
    let mut session = open(Script::Valid, &camera, fast_config()).await;
    timeout(WAIT, session.wait_for_auto_capture())
        .await
        .expect("auto-capture fires")
        .expect("capture succeeds");
    session.settle_enhancement().await;

    let before = session.preview().expect("preview");
    assert_eq!(session.rotate_right().expect("rotate"), Rotation::Cw90);
    assert_eq!(session.rotate_right().expect("rotate"), Rotation::Cw180);
    assert_eq!(session.rotate_left().expect("rotate"), Rotation::Cw90);

    let result = session.confirm().expect("confirm");
    assert_eq!(result.manual_rotation, Rotation::Cw90);
    assert_eq!((result.width, result.height), (before.height(), before.width()));
}

#[tokio::test]
async fn retake_forgets_best_frame_and_smoothed_corners() {
    let camera = CountingCamera::default();
    let mut session = open(Script::Valid, &camera, manual_config()).await;
    let mut overlay = session.subscribe_overlay();
    timeout(WAIT, overlay.wait_for(|o| o.smoothed.is_some()))
        .await
        .expect("overlay published")
        .expect("session alive");
    let before = session.tracker_state();
    assert!(before.best.is_some());
    assert!(before.smoothed_points.is_some());

    session.capture().await.expect("capture");
    session.retake().expect("retake");

    let after = session.tracker_state();
    assert!(after.best.is_none());
    assert!(after.smoothed_points.is_none());
    assert!(after.stable_points.is_none());
    assert_eq!(after.steady_count, 0);
    assert_eq!(*overlay.borrow_and_update(), Overlay::default());

    timeout(WAIT, overlay.wait_for(|o| o.smoothed.is_some()))
        .await
        .expect("tracking resumes")
        .expect("session alive");
}

#[tokio::test]
async fn overlay_follows_the_page_and_freezes_at_capture() {
    let camera = CountingCamera::default();
    let mut session = open_with(
        ScriptedAnalyzer::new(Script::Drifting),
        &camera,
        manual_config(),
        Rotation::None,
    )
    .await;
    let mut overlay = session.subscribe_overlay();

    for _ in 0..3 {
        timeout(WAIT, overlay.changed())
            .await
            .expect("overlay keeps moving")
            .expect("session alive");
    }
    let shown = overlay.borrow_and_update().smoothed.expect("smoothed corners");
    let centre = shown.centroid();
    assert!((centre.y - 240.0).abs() < 3.0, "centre {centre:?}");
    assert!((310.0..370.0).contains(&centre.x), "centre {centre:?}");
    // Padded around the detected page.
    assert!(shown.area() > page().area());

    session.capture().await.expect("capture");
    let _ = overlay.borrow_and_update();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!overlay.has_changed().expect("session alive"));
}

#[tokio::test]
async fn refound_page_tightens_the_crop() {
    let plain = capture_once(ScriptedAnalyzer::new(Script::Valid), Rotation::None).await;

    let mut analyzer = ScriptedAnalyzer::new(Script::Valid);
    analyzer.refound = Some(0.81);
    let refined = capture_once(analyzer, Rotation::None).await;

    assert!(refined.perspective_corrected);
    // sqrt(0.81) of each side survives the second crop.
    let (want_w, want_h) = (plain.width as f32 * 0.9, plain.height as f32 * 0.9);
    assert!((refined.width as f32 - want_w).abs() <= 2.0, "{} vs {want_w}", refined.width);
    assert!((refined.height as f32 - want_h).abs() <= 2.0, "{} vs {want_h}", refined.height);
}

#[tokio::test]
async fn small_refound_page_keeps_the_first_correction() {
    let plain = capture_once(ScriptedAnalyzer::new(Script::Valid), Rotation::None).await;

    let mut analyzer = ScriptedAnalyzer::new(Script::Valid);
    analyzer.refound = Some(0.4);
    let kept = capture_once(analyzer, Rotation::None).await;

    assert!(kept.perspective_corrected);
    assert_eq!((kept.width, kept.height), (plain.width, plain.height));
}

#[tokio::test]
async fn failed_correction_keeps_the_whole_frame() {
    let mut analyzer = ScriptedAnalyzer::new(Script::Valid);
    analyzer.failing_correction = true;
    let result = capture_once(analyzer, Rotation::None).await;

    assert!(!result.perspective_corrected);
    assert_eq!((result.width, result.height), (640, 480));
}

#[tokio::test]
async fn device_orientation_is_applied_at_capture() {
    let upright = capture_once(ScriptedAnalyzer::new(Script::Empty), Rotation::None).await;
    assert_eq!((upright.width, upright.height), (640, 480));

    let turned = capture_once(ScriptedAnalyzer::new(Script::Empty), Rotation::Cw90).await;
    assert_eq!(turned.device_rotation, Rotation::Cw90);
    assert_eq!(turned.manual_rotation, Rotation::None);
    assert_eq!((turned.width, turned.height), (480, 640));
}

#[tokio::test]
async fn abandoned_capture_goes_back_to_searching() {
    let camera = CountingCamera::default();
    let mut analyzer = ScriptedAnalyzer::new(Script::Valid);
    analyzer.correction_delay = Duration::from_millis(300);
    let mut session = open_with(analyzer, &camera, manual_config(), Rotation::None).await;
    let mut guidance = session.subscribe_guidance();
    timeout(WAIT, guidance.wait_for(|g| g.message == READY_MESSAGE))
        .await
        .expect("page ready")
        .expect("session alive");

    // Give up while the page is still being corrected.
    assert!(
        timeout(Duration::from_millis(30), session.capture())
            .await
            .is_err()
    );

    assert_eq!(session.state(), CaptureState::Searching);
    assert!(session.camera_active());
    assert_eq!(camera.stops(), 1);
    assert_eq!(camera.starts(), 2);

    let _ = guidance.borrow_and_update();
    timeout(WAIT, guidance.changed())
        .await
        .expect("analysis resumes")
        .expect("session alive");
    timeout(WAIT, session.capture())
        .await
        .expect("capture finishes")
        .expect("capture succeeds");
    assert!(matches!(
        session.state(),
        CaptureState::Enhancing | CaptureState::Reviewing
    ));
}

#[tokio::test]
async fn revoked_camera_access_replaces_guidance() {
    let camera = CountingCamera::default();
    let session = open(Script::Valid, &camera, manual_config()).await;
    let mut guidance = session.subscribe_guidance();
    timeout(WAIT, guidance.wait_for(|g| g.message == READY_MESSAGE))
        .await
        .expect("page ready")
        .expect("session alive");

    camera.revoke();
    let shown = timeout(WAIT, guidance.wait_for(|g| g.severity == Severity::Error))
        .await
        .expect("failure surfaced")
        .expect("session alive")
        .clone();
    assert_eq!(shown, Guidance::for_error(&ScanError::PermissionDenied));
    assert_eq!(shown.message, "Camera access was blocked.");
    assert_eq!(session.state(), CaptureState::Searching);
}

#[tokio::test]
async fn operations_outside_their_state_are_rejected() {
    let camera = CountingCamera::default();
    let mut session = open(Script::Tilted, &camera, fast_config()).await;

    assert!(matches!(
        session.rotate_right(),
        Err(ScanError::InvalidState { operation: "rotate", .. })
    ));
    assert!(matches!(session.confirm(), Err(ScanError::InvalidState { .. })));
    assert!(matches!(session.retake(), Err(ScanError::InvalidState { .. })));

    session.close();
    assert_eq!(session.state(), CaptureState::Closed);
    assert!(matches!(
        session.capture().await,
        Err(ScanError::InvalidState { operation: "capture", .. })
    ));
    session.close();
    assert_eq!(camera.stops(), 1);
}

#[tokio::test]
async fn dropping_the_session_releases_the_camera() {
    let camera = CountingCamera::default();
    let session = open(Script::Valid, &camera, fast_config()).await;
    assert!(session.camera_active());
    drop(session);
    assert_eq!(camera.stops(), 1);
}

#[tokio::test]
async fn failed_engine_blocks_the_session() {
    let (engine, installer) = EngineHandle::<ScriptedAnalyzer>::loading();
    installer.fail("model missing");
    let opened = CaptureSession::open(
        &engine,
        Box::new(CountingCamera::default()),
        Arc::new(FixedOrientation::default()),
        fast_config(),
    )
    .await;
    assert!(matches!(opened, Err(ScanError::EngineUnavailable)));
}

#[tokio::test]
async fn session_waits_for_a_loading_engine() {
    let (engine, installer) = EngineHandle::<ScriptedAnalyzer>::loading();
    let camera = CountingCamera::default();
    let source = camera.clone();
    let pending = tokio::spawn(async move {
        CaptureSession::open(
            &engine,
            Box::new(source),
            Arc::new(FixedOrientation::default()),
            fast_config(),
        )
        .await
        .map(|session| session.state())
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(camera.starts(), 0);
    installer.install(ScriptedAnalyzer::new(Script::Valid));

    let state = timeout(WAIT, pending)
        .await
        .expect("open completes")
        .expect("task joins")
        .expect("session opens");
    assert_eq!(state, CaptureState::Searching);
}

#[tokio::test]
async fn camera_failures_are_reported_not_retried() {
    let engine = EngineHandle::ready(ScriptedAnalyzer::new(Script::Valid));
    let denied = CaptureSession::open(
        &engine,
        Box::new(UnavailableCamera::denied()),
        Arc::new(FixedOrientation::default()),
        fast_config(),
    )
    .await;
    assert!(matches!(denied, Err(ScanError::PermissionDenied)));

    let missing = CaptureSession::open(
        &engine,
        Box::new(UnavailableCamera::missing()),
        Arc::new(FixedOrientation::default()),
        fast_config(),
    )
    .await;
    assert!(matches!(missing, Err(ScanError::CameraUnavailable(_))));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_the_camera_starts() {
    let camera = CountingCamera::default();
    let mut config = fast_config();
    config.session.analysis_interval_ms = 0;
    let engine = EngineHandle::ready(ScriptedAnalyzer::new(Script::Valid));
    let opened = CaptureSession::open(
        &engine,
        Box::new(camera.clone()),
        Arc::new(FixedOrientation::default()),
        config,
    )
    .await;
    assert!(matches!(opened, Err(ScanError::Config(_))));
    assert_eq!(camera.starts(), 0);
}

#[tokio::test]
async fn vision_engine_scans_a_synthetic_page() {
    let config = fast_config();
    let engine = EngineHandle::ready(VisionEngine::new(&config));
    let frame = render_page(640, 480, &page());
    let mut session = CaptureSession::open(
        &engine,
        Box::new(docscan_capture::ReplaySource::new(vec![frame])),
        Arc::new(FixedOrientation(Rotation::None)),
        config,
    )
    .await
    .expect("session opens");

    let mut guidance = session.subscribe_guidance();
    timeout(VISION_WAIT, guidance.wait_for(|g| g.message == READY_MESSAGE))
        .await
        .expect("page judged ready")
        .expect("session alive");

    timeout(VISION_WAIT, session.wait_for_auto_capture())
        .await
        .expect("auto-capture fires")
        .expect("capture succeeds");
    session.settle_enhancement().await;
    let result = session.confirm().expect("confirm");

    assert!(result.perspective_corrected);
    // Upright page: taller than wide.
    assert!(result.height > result.width);
}
