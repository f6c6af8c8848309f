// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame quality evaluator — measures one frame and produces a report plus
// the detected document boundary.

use docscan_core::error::{Result, ScanError};
use docscan_core::{QualityThresholds, Quad};
use image::{DynamicImage, GrayImage};
use tracing::{debug, instrument};

use crate::detect::{Detection, detect_document};
use crate::image::ops::{self, LumaHistogram, Region};
use crate::quality::report::{FrameMetrics, QualityReport};

/// Result of evaluating one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub report: QualityReport,
    /// Raw (unsmoothed, unpadded) document corners, if found.
    pub quad: Option<Quad>,
    /// Contour area of the detected document, 0 when none.
    pub detected_area: f64,
}

/// Stateless evaluator bound to one threshold profile.
#[derive(Debug, Clone)]
pub struct FrameEvaluator {
    thresholds: QualityThresholds,
}

impl FrameEvaluator {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Evaluate `image`. `previous` is the last accepted raw quad, used for
    /// the detection continuity bonus.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn evaluate(&self, image: &DynamicImage, previous: Option<&Quad>) -> Result<Evaluation> {
        if image.width() < 3 || image.height() < 3 {
            return Err(ScanError::FrameAnalysis(format!(
                "frame too small to analyse ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let gray = image.to_luma8();
        let detection = self.detect(&gray, previous);
        let metrics = self.measure(&gray, detection.as_ref().map(|d| &d.quad));
        let report = QualityReport::from_metrics(&metrics, &self.thresholds);

        debug!(
            blur = report.blur_score,
            brightness = report.brightness,
            issue = ?report.issue,
            "frame evaluated"
        );

        Ok(Evaluation {
            report,
            quad: detection.map(|d| d.quad),
            detected_area: detection.map_or(0.0, |d| d.area),
        })
    }

    /// Document boundary only, without quality scoring.
    pub fn detect(&self, gray: &GrayImage, previous: Option<&Quad>) -> Option<Detection> {
        detect_document(gray, &self.thresholds, previous)
    }

    /// Measure sharpness, lighting and, when `quad` is given, the regional,
    /// tilt and cutoff properties of the document.
    ///
    /// With a document, sharpness, shadow and tile sharpness are measured
    /// inside the quad pulled in by `roi_inset`, so the desk and an in-plane
    /// rotation never leak into them. Brightness and contrast stay global.
    pub fn measure(&self, gray: &GrayImage, quad: Option<&Quad>) -> FrameMetrics {
        let (width, height) = gray.dimensions();
        let histogram = LumaHistogram::from_luma(gray);
        let response = ops::laplacian(gray);

        let Some(quad) = quad else {
            return FrameMetrics {
                blur_score: ops::response_variance(&response, &Region::whole(width, height)),
                brightness: histogram.mean(),
                contrast: histogram.std_dev(),
                ..FrameMetrics::default()
            };
        };

        let roi = Region::within(&quad.shrunk(self.thresholds.roi_inset), width, height);
        FrameMetrics {
            blur_score: ops::response_variance(&response, &roi),
            brightness: histogram.mean(),
            contrast: histogram.std_dev(),
            document: true,
            shadow_delta: ops::brightness_spread(gray, &roi, self.thresholds.shadow_grid),
            min_tile_sharpness: ops::min_tile_sharpness(
                &response,
                &roi,
                self.thresholds.tile_blur_grid,
            ),
            tilt: Some(quad.tilt()),
            cutoff: quad.touches_border(width, height, self.thresholds.cutoff_margin),
        }
    }
}
