// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Static image validation — one-shot quality check of an uploaded or
// gallery-picked photo, outside the live camera loop.

use docscan_core::error::Result;
use docscan_core::{QualityIssue, QualityThresholds, Rect, Rotation};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::image::ops::{LumaHistogram, dark_content_bounds};
use crate::image::processor::ImageProcessor;
use crate::quality::{FrameEvaluator, QualityReport};

/// Long edge of the working copy used for analysis.
pub const WORKING_LONG_EDGE: u32 = 1024;
/// Shorter side below this many pixels is flagged as low resolution.
pub const MIN_SHORT_SIDE: u32 = 600;

/// What a validation finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "issue")]
pub enum ValidationKind {
    Quality(QualityIssue),
    LowResolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: ValidationKind,
    pub message: String,
}

impl ValidationIssue {
    fn quality(issue: QualityIssue) -> Self {
        Self {
            kind: ValidationKind::Quality(issue),
            message: issue.message().into(),
        }
    }

    fn low_resolution(width: u32, height: u32) -> Self {
        Self {
            kind: ValidationKind::LowResolution,
            message: format!(
                "Low resolution ({width}x{height}) - text may be hard to read"
            ),
        }
    }
}

/// Outcome of validating one still image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticValidation {
    pub is_valid: bool,
    /// Problems that make the image unusable.
    pub issues: Vec<ValidationIssue>,
    /// Problems worth mentioning; empty whenever `issues` is not.
    pub warnings: Vec<ValidationIssue>,
    pub suggested_rotation: Rotation,
    /// Document or ink bounds in original image pixels.
    pub content_box: Option<Rect>,
    /// Measurements at working resolution.
    pub report: QualityReport,
    pub width: u32,
    pub height: u32,
}

/// Validates still images with the still-image threshold profile.
#[derive(Debug, Clone)]
pub struct StaticValidator {
    evaluator: FrameEvaluator,
}

impl StaticValidator {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self {
            evaluator: FrameEvaluator::new(thresholds),
        }
    }

    /// Decode and validate encoded image bytes.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn validate_bytes(&self, data: &[u8]) -> Result<StaticValidation> {
        let processor = ImageProcessor::from_bytes(data)?;
        self.validate(processor.as_dynamic())
    }

    /// Validate a decoded image.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn validate(&self, image: &DynamicImage) -> Result<StaticValidation> {
        let (width, height) = (image.width(), image.height());
        let (working, factor) =
            ImageProcessor::from_dynamic(image.clone()).fit_within(WORKING_LONG_EDGE);
        let working = working.into_dynamic();

        let evaluation = self.evaluator.evaluate(&working, None)?;
        let report = evaluation.report;

        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        for issue in &report.issues {
            match issue {
                QualityIssue::TooDark | QualityIssue::Overexposed | QualityIssue::Blurry => {
                    issues.push(ValidationIssue::quality(*issue))
                }
                _ => warnings.push(ValidationIssue::quality(*issue)),
            }
        }
        if width.min(height) < MIN_SHORT_SIDE {
            warnings.push(ValidationIssue::low_resolution(width, height));
        }
        if !issues.is_empty() {
            warnings.clear();
        }

        let content_box = match evaluation.quad {
            Some(quad) => Some(Rect::enclosing(&quad.scaled(factor), width, height)),
            None => {
                let gray = working.to_luma8();
                let threshold = LumaHistogram::from_luma(&gray).otsu_threshold();
                dark_content_bounds(&gray, threshold)
                    .map(|rect| clamp_rect(rect.scaled(factor), width, height))
            }
        }
        .filter(|rect| !rect.is_empty());

        let suggested_rotation = match content_box {
            Some(rect) if rect.width > rect.height => Rotation::Cw90,
            _ => Rotation::None,
        };

        let validation = StaticValidation {
            is_valid: issues.is_empty(),
            issues,
            warnings,
            suggested_rotation,
            content_box,
            report,
            width,
            height,
        };
        info!(
            is_valid = validation.is_valid,
            issues = validation.issues.len(),
            warnings = validation.warnings.len(),
            "still image validated"
        );
        Ok(validation)
    }
}

fn clamp_rect(rect: Rect, width: u32, height: u32) -> Rect {
    let x = rect.x.min(width);
    let y = rect.y.min(height);
    Rect {
        x,
        y,
        width: rect.width.min(width - x),
        height: rect.height.min(height - y),
    }
}
