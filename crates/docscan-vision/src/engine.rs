// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vision engine — the single handle through which the capture session
// reaches every image operation.

use docscan_core::error::Result;
use docscan_core::{EnhanceMode, Quad, ScannerConfig};
use image::DynamicImage;
use tracing::{debug, info, instrument};

use crate::quality::{Evaluation, FrameEvaluator};
use crate::scan::{PerspectiveCorrector, ScanEnhancer};
use crate::validate::{StaticValidation, StaticValidator};

/// Live-profile evaluator, still-image validator, perspective corrector and
/// enhancer bundled behind one value.
///
/// Construction is cheap, but callers treat it as a loaded resource and
/// share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct VisionEngine {
    live: FrameEvaluator,
    still: StaticValidator,
    corrector: PerspectiveCorrector,
}

impl VisionEngine {
    pub fn new(config: &ScannerConfig) -> Self {
        info!("vision engine ready");
        Self {
            live: FrameEvaluator::new(config.live.clone()),
            still: StaticValidator::new(config.still.clone()),
            corrector: PerspectiveCorrector::new(),
        }
    }

    /// Evaluate one live camera frame.
    pub fn evaluate(&self, image: &DynamicImage, previous: Option<&Quad>) -> Result<Evaluation> {
        self.live.evaluate(image, previous)
    }

    /// Look for the document again inside an already corrected image.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn redetect(&self, image: &DynamicImage) -> Option<Quad> {
        let found = self.live.detect(&image.to_luma8(), None).map(|d| d.quad);
        debug!(found = found.is_some(), "re-detection on corrected image");
        found
    }

    pub fn correct(&self, image: &DynamicImage, quad: &Quad) -> Result<DynamicImage> {
        self.corrector.warp(image, quad)
    }

    pub fn enhance(&self, image: DynamicImage, mode: EnhanceMode) -> Result<DynamicImage> {
        Ok(ScanEnhancer::from_dynamic(image).enhance(mode)?.into_dynamic())
    }

    pub fn validate_bytes(&self, data: &[u8]) -> Result<StaticValidation> {
        self.still.validate_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::render_page;

    #[test]
    fn correct_then_redetect_padded_crop() {
        let engine = VisionEngine::new(&ScannerConfig::default());
        let frame = render_page(640, 480, &Quad::from_rect(170.0, 40.0, 300.0, 400.0));

        // A generous crop leaves desk visible around the page.
        let loose = Quad::from_rect(130.0, 10.0, 380.0, 460.0);
        let corrected = engine.correct(&frame, &loose).expect("warp");
        assert_eq!((corrected.width(), corrected.height()), (380, 460));

        let inner = engine.redetect(&corrected).expect("page inside crop");
        let coverage = inner.area() / (380.0 * 460.0);
        assert!(coverage > 0.6 && coverage < 0.8, "coverage {coverage}");
    }
}
