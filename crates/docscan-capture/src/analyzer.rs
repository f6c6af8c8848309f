// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The seam between the capture session and the image-analysis engine.

use docscan_core::error::Result;
use docscan_core::{EnhanceMode, Quad};
use docscan_vision::{Evaluation, VisionEngine};
use image::DynamicImage;

/// Everything the capture session needs from a vision engine.
///
/// Calls are blocking and CPU-bound; the session always invokes them from
/// `spawn_blocking`.
pub trait FrameAnalyzer: Send + Sync + 'static {
    /// Score one live frame and locate the document.
    fn evaluate(&self, image: &DynamicImage, previous: Option<&Quad>) -> Result<Evaluation>;

    /// Locate the document inside an already corrected image.
    fn redetect(&self, image: &DynamicImage) -> Option<Quad>;

    /// Warp `quad` to an upright rectangle.
    fn correct(&self, image: &DynamicImage, quad: &Quad) -> Result<DynamicImage>;

    fn enhance(&self, image: DynamicImage, mode: EnhanceMode) -> Result<DynamicImage>;
}

impl FrameAnalyzer for VisionEngine {
    fn evaluate(&self, image: &DynamicImage, previous: Option<&Quad>) -> Result<Evaluation> {
        VisionEngine::evaluate(self, image, previous)
    }

    fn redetect(&self, image: &DynamicImage) -> Option<Quad> {
        VisionEngine::redetect(self, image)
    }

    fn correct(&self, image: &DynamicImage, quad: &Quad) -> Result<DynamicImage> {
        VisionEngine::correct(self, image, quad)
    }

    fn enhance(&self, image: DynamicImage, mode: EnhanceMode) -> Result<DynamicImage> {
        VisionEngine::enhance(self, image, mode)
    }
}
