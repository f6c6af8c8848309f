// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-frame quality report and the rules that turn raw measurements into
// issues.

use docscan_core::guidance::Guidance;
use docscan_core::{QualityIssue, QualityThresholds, Severity, TiltRatios};
use serde::{Deserialize, Serialize};

/// Raw measurements taken from one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameMetrics {
    /// Laplacian variance inside the document region, or over the whole
    /// frame when no document was found.
    pub blur_score: f64,
    /// Mean luminance (0-255).
    pub brightness: f64,
    /// Luminance standard deviation.
    pub contrast: f64,
    /// Whether a document boundary was found.
    pub document: bool,
    /// Max-minus-min tile brightness inside the document.
    pub shadow_delta: Option<f64>,
    /// Lowest tile Laplacian variance inside the document.
    pub min_tile_sharpness: Option<f64>,
    pub tilt: Option<TiltRatios>,
    /// A detected corner lies too close to the frame edge.
    pub cutoff: bool,
}

/// Quality verdict for a single frame. Built fresh on every analysis tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub blur_score: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub shadow_delta: Option<f64>,
    pub min_tile_sharpness: Option<f64>,
    pub tilt: Option<TiltRatios>,
    pub cutoff: bool,
    pub is_valid: bool,
    /// The single issue surfaced to the user.
    pub issue: Option<QualityIssue>,
    /// Every issue found, most urgent first.
    pub issues: Vec<QualityIssue>,
    pub message: String,
    pub severity: Severity,
}

impl QualityReport {
    /// Apply `thresholds` to `metrics`.
    pub fn from_metrics(metrics: &FrameMetrics, thresholds: &QualityThresholds) -> Self {
        let mut issues = Vec::new();

        if metrics.brightness < thresholds.dark_brightness_max {
            issues.push(QualityIssue::TooDark);
        }
        if metrics.brightness > thresholds.bright_brightness_min
            && metrics.contrast < thresholds.overexposed_contrast_max
        {
            issues.push(QualityIssue::Overexposed);
        }
        if !metrics.document {
            issues.push(QualityIssue::NoDocument);
        }
        if metrics.cutoff {
            issues.push(QualityIssue::CutOff);
        }
        if metrics
            .tilt
            .is_some_and(|tilt| tilt.worst() > thresholds.tilt_ratio_max)
        {
            issues.push(QualityIssue::Tilted);
        }
        if metrics.blur_score < thresholds.blur_variance_min {
            issues.push(QualityIssue::Blurry);
        }
        if metrics
            .min_tile_sharpness
            .is_some_and(|s| s < thresholds.tile_blur_min)
        {
            issues.push(QualityIssue::PartiallyBlurry);
        }
        if metrics
            .shadow_delta
            .is_some_and(|d| d > thresholds.shadow_delta_max)
        {
            issues.push(QualityIssue::Shadow);
        }

        issues.sort();
        let issue = issues.first().copied();
        let guidance = Guidance::for_issue(issue);

        Self {
            blur_score: metrics.blur_score,
            brightness: metrics.brightness,
            contrast: metrics.contrast,
            shadow_delta: metrics.shadow_delta,
            min_tile_sharpness: metrics.min_tile_sharpness,
            tilt: metrics.tilt,
            cutoff: metrics.cutoff,
            is_valid: issues.is_empty(),
            issue,
            issues,
            message: guidance.message,
            severity: guidance.severity,
        }
    }

    pub fn has(&self, issue: QualityIssue) -> bool {
        self.issues.contains(&issue)
    }

    pub fn guidance(&self) -> Guidance {
        Guidance {
            message: self.message.clone(),
            severity: self.severity,
        }
    }
}
