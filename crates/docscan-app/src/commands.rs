// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docscan_capture::{
    CaptureSession, EngineHandle, FixedOrientation, ReplaySource, ScanResult, UploadCollaborator,
};
use docscan_core::error::{Result, ScanError};
use docscan_core::{Rotation, ScannerConfig};
use docscan_vision::{ImageProcessor, StaticValidation, VisionEngine};
use tracing::{info, warn};

use crate::upload::DirectoryUpload;

/// Load `path`, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<ScannerConfig> {
    match path {
        Some(path) => ScannerConfig::load(path),
        None => Ok(ScannerConfig::default()),
    }
}

fn parse_rotation(degrees: i32) -> Result<Rotation> {
    Rotation::from_degrees(degrees).ok_or_else(|| {
        ScanError::Config(format!("rotation must be a multiple of 90 degrees, got {degrees}"))
    })
}

/// One-shot validation of a still image.
pub fn validate(file: &Path, config: &ScannerConfig) -> Result<StaticValidation> {
    let data = std::fs::read(file)?;
    let engine = VisionEngine::new(config);
    let validation = engine.validate_bytes(&data)?;
    if validation.is_valid {
        info!(file = %file.display(), warnings = validation.warnings.len(), "image accepted");
    } else {
        warn!(file = %file.display(), issues = validation.issues.len(), "image rejected");
    }
    Ok(validation)
}

pub struct ScanOptions {
    pub frames: Vec<PathBuf>,
    pub out: PathBuf,
    /// Manual rotation applied during review, in degrees.
    pub rotate: i32,
    /// Orientation reported by the device sensor, in degrees.
    pub device_rotation: i32,
    /// How long to wait for a steady document before capturing anyway.
    pub timeout: Duration,
}

/// Replay frames through a live session and hand the confirmed scan to
/// the output directory.
pub async fn scan(options: ScanOptions, config: ScannerConfig) -> Result<ScanResult> {
    let manual = parse_rotation(options.rotate)?;
    let device = parse_rotation(options.device_rotation)?;
    let frames = options
        .frames
        .iter()
        .map(|path| ImageProcessor::open(path).map(ImageProcessor::into_dynamic))
        .collect::<Result<Vec<_>>>()?;
    info!(frames = frames.len(), "replaying frames");

    let engine_config = config.clone();
    let engine = EngineHandle::spawn_blocking(move || Ok(VisionEngine::new(&engine_config)));
    let mut session = CaptureSession::open(
        &engine,
        Box::new(ReplaySource::new(frames)),
        Arc::new(FixedOrientation(device)),
        config,
    )
    .await?;

    let mut guidance = session.subscribe_guidance();
    let narrator = tokio::spawn(async move {
        while guidance.changed().await.is_ok() {
            let current = guidance.borrow_and_update().clone();
            info!(message = %current.message, severity = ?current.severity, "guidance");
        }
    });

    match tokio::time::timeout(options.timeout, session.auto_capture_ready()).await {
        Ok(ready) => ready?,
        Err(_) => warn!(
            timeout_ms = options.timeout.as_millis() as u64,
            "no steady document; capturing the best frame so far"
        ),
    }
    session.capture().await?;
    narrator.abort();

    if !session.settle_enhancement().await {
        warn!("enhancement unavailable; using the corrected image");
    }
    for _ in 0..manual.degrees() / 90 {
        session.rotate_right()?;
    }

    let result = session.confirm()?;
    let upload = DirectoryUpload::new(options.out);
    upload.hand_off(&result);
    info!(dir = %upload.dir().display(), "scan handed to output directory");
    Ok(result)
}
