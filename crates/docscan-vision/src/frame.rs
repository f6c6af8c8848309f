// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A single camera frame.

use image::DynamicImage;

/// Immutable pixel buffer grabbed from the camera.
///
/// Frames are shared as `Arc<Frame>` between the analysis loop and the
/// tracker; the buffer is freed when the last reference goes away.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    /// Monotonically increasing per camera session.
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: DynamicImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}
