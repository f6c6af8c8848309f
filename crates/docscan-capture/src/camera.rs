// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Camera abstraction and the lease that guarantees the hardware is released.
//
// Real camera backends live with the host application; this module ships a
// replay source (decoded images played back in a loop) and a stub for
// platforms without a camera.

use docscan_core::Rotation;
use docscan_core::error::{Result, ScanError};
use docscan_vision::Frame;
use image::DynamicImage;
use tracing::{debug, info, warn};

/// A live frame producer.
pub trait FrameSource: Send + 'static {
    /// Acquire the device and begin streaming.
    fn start(&mut self) -> Result<()>;

    /// Latest frame. Only valid between `start` and `stop`.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Stop streaming and release the device. Must be safe to call twice.
    fn stop(&mut self);
}

/// Device orientation reported in clockwise quarter turns.
pub trait OrientationSensor: Send + Sync + 'static {
    fn rotation(&self) -> Rotation;
}

/// Orientation sensor that always reports the same value.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedOrientation(pub Rotation);

impl OrientationSensor for FixedOrientation {
    fn rotation(&self) -> Rotation {
        self.0
    }
}

/// Plays back a fixed list of images, looping forever.
pub struct ReplaySource {
    frames: Vec<DynamicImage>,
    cursor: usize,
    sequence: u64,
    streaming: bool,
}

impl ReplaySource {
    pub fn new(frames: Vec<DynamicImage>) -> Self {
        Self {
            frames,
            cursor: 0,
            sequence: 0,
            streaming: false,
        }
    }
}

impl FrameSource for ReplaySource {
    fn start(&mut self) -> Result<()> {
        if self.frames.is_empty() {
            return Err(ScanError::CameraUnavailable("replay source has no frames".into()));
        }
        self.streaming = true;
        debug!(frames = self.frames.len(), "replay source started");
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.streaming {
            return Err(ScanError::CameraReleased);
        }
        let image = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        self.sequence += 1;
        Ok(Frame::new(image, self.sequence))
    }

    fn stop(&mut self) {
        self.streaming = false;
    }
}

/// Camera stub for desktop/CI builds where no device exists.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableCamera {
    denied: bool,
}

impl UnavailableCamera {
    /// No camera present.
    pub fn missing() -> Self {
        Self { denied: false }
    }

    /// A camera exists but the user refused access.
    pub fn denied() -> Self {
        Self { denied: true }
    }
}

impl FrameSource for UnavailableCamera {
    fn start(&mut self) -> Result<()> {
        warn!("FrameSource::start called on unavailable camera");
        if self.denied {
            Err(ScanError::PermissionDenied)
        } else {
            Err(ScanError::CameraUnavailable("no camera on this platform".into()))
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        Err(ScanError::CameraReleased)
    }

    fn stop(&mut self) {}
}

/// Exclusive use of a camera. The device is released on [`release`],
/// on drop, or both; releasing twice is harmless.
///
/// [`release`]: CameraLease::release
pub struct CameraLease {
    source: Box<dyn FrameSource>,
    active: bool,
}

impl CameraLease {
    /// Start `source`. Failure is returned as-is; acquisition is never
    /// retried here.
    pub fn acquire(mut source: Box<dyn FrameSource>) -> Result<Self> {
        source.start()?;
        info!("camera acquired");
        Ok(Self {
            source,
            active: true,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn grab(&mut self) -> Result<Frame> {
        if !self.active {
            return Err(ScanError::CameraReleased);
        }
        self.source.next_frame()
    }

    /// Restart streaming after a release (retake).
    pub fn resume(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        self.source.start()?;
        self.active = true;
        info!("camera re-acquired");
        Ok(())
    }

    /// Stop streaming. Returns whether the camera was active.
    pub fn release(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.source.stop();
        self.active = false;
        info!("camera released");
        true
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}
