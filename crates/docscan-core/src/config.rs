// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner configuration: quality thresholds for the live and still-image
// profiles, tracker tuning, loop cadence and output encoding.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ScanError};

/// Thresholds used by the frame quality evaluator.
///
/// Both profiles score sharpness with the same metric (variance of the
/// Laplacian on the 8-bit grayscale image at analysis resolution), so the
/// live and still values are directly comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Laplacian variance on the page (whole frame without one) below this
    /// is blurry.
    pub blur_variance_min: f64,
    /// Gaussian sigma applied before edge detection.
    pub edge_blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Dilation radius (pixels) used to bridge gaps in the edge map.
    pub dilate_radius: u8,
    /// Contours below this area (px^2) are treated as noise.
    pub min_contour_area: f64,
    /// Largest contour deviation from the fitted quad, as a fraction of its
    /// perimeter.
    pub approx_epsilon: f64,
    /// Accepted bounding-box aspect range (width / height) for portrait pages.
    pub portrait_aspect: (f32, f32),
    /// Accepted bounding-box aspect range for landscape pages.
    pub landscape_aspect: (f32, f32),
    /// A candidate whose area is within this fraction of the previous
    /// accepted quad gets the continuity bonus.
    pub continuity_tolerance: f64,
    pub continuity_bonus: f64,
    /// How far each corner is pulled towards the centre before the
    /// on-page checks, as a fraction of its distance.
    pub roi_inset: f32,
    /// Grid size for the brightness (shadow) check.
    pub shadow_grid: u32,
    /// Max-minus-min tile brightness above this flags a hard shadow.
    pub shadow_delta_max: f64,
    /// Grid size for the localised blur check.
    pub tile_blur_grid: u32,
    /// Any tile with Laplacian variance below this flags partial blur.
    pub tile_blur_min: f64,
    /// Opposing edges may differ by at most this ratio.
    pub tilt_ratio_max: f32,
    /// Corners closer than this to the frame edge mean the page is cut off.
    pub cutoff_margin: f32,
    /// Mean brightness below this is too dark.
    pub dark_brightness_max: f64,
    /// Mean brightness above this, combined with low contrast, is overexposed.
    pub bright_brightness_min: f64,
    pub overexposed_contrast_max: f64,
}

impl QualityThresholds {
    /// Profile for the continuous camera loop.
    pub fn live() -> Self {
        Self {
            blur_variance_min: 150.0,
            edge_blur_sigma: 1.5,
            canny_low: 30.0,
            canny_high: 100.0,
            dilate_radius: 1,
            min_contour_area: 10_000.0,
            approx_epsilon: 0.02,
            portrait_aspect: (0.35, 0.95),
            landscape_aspect: (1.05, 2.8),
            continuity_tolerance: 0.2,
            continuity_bonus: 3.0,
            roi_inset: 0.08,
            shadow_grid: 4,
            shadow_delta_max: 60.0,
            tile_blur_grid: 3,
            tile_blur_min: 250.0,
            tilt_ratio_max: 1.15,
            cutoff_margin: 20.0,
            dark_brightness_max: 45.0,
            bright_brightness_min: 220.0,
            overexposed_contrast_max: 18.0,
        }
    }

    /// Profile for a single already-selected image.
    pub fn still() -> Self {
        Self {
            blur_variance_min: 110.0,
            canny_low: 75.0,
            canny_high: 200.0,
            ..Self::live()
        }
    }

    fn validate(&self, profile: &str) -> Result<()> {
        if self.shadow_grid == 0 || self.tile_blur_grid == 0 {
            return Err(ScanError::Config(format!("{profile}: grid sizes must be non-zero")));
        }
        if self.canny_low > self.canny_high {
            return Err(ScanError::Config(format!(
                "{profile}: canny_low ({}) exceeds canny_high ({})",
                self.canny_low, self.canny_high
            )));
        }
        if !(0.0..0.5).contains(&self.roi_inset) {
            return Err(ScanError::Config(format!(
                "{profile}: roi_inset must be in [0, 0.5)"
            )));
        }
        if self.approx_epsilon <= 0.0 {
            return Err(ScanError::Config(format!(
                "{profile}: approx_epsilon must be positive"
            )));
        }
        Ok(())
    }
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self::live()
    }
}

/// Tuning for the quadrilateral tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Blend factor for per-corner smoothing (0 < factor <= 1).
    pub smoothing: f32,
    /// Consecutive valid ticks required before auto-capture fires.
    pub steady_threshold: u32,
    /// Cadence of the slow stable snapshot.
    pub stable_interval_ms: u64,
    /// Padding along the document's long axis (fraction of extent).
    pub pad_long_axis: f32,
    /// Padding along the short axis (fraction of extent).
    pub pad_short_axis: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.45,
            steady_threshold: 5,
            stable_interval_ms: 200,
            pad_long_axis: 0.03,
            pad_short_axis: 0.015,
        }
    }
}

impl TrackerConfig {
    pub fn stable_interval(&self) -> Duration {
        Duration::from_millis(self.stable_interval_ms)
    }
}

/// Post-capture enhancement style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhanceMode {
    /// Auto-levels and a light unsharp mask; keeps colour.
    #[default]
    Natural,
    /// Auto-levels plus a stronger contrast boost.
    HighContrast,
    /// Adaptive black-and-white thresholding for faint handwriting.
    Binarized,
}

/// Timing and behaviour of a capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Analysis loop period (~15 fps).
    pub analysis_interval_ms: u64,
    /// UI tracking loop period (~60 fps).
    pub tracking_interval_ms: u64,
    /// The refinement pass only re-crops when the re-detected quad covers
    /// at least this fraction of the corrected image.
    pub refine_min_coverage: f32,
    pub enhance: EnhanceMode,
    /// Disable to require a manual capture.
    pub auto_capture: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            analysis_interval_ms: 60,
            tracking_interval_ms: 16,
            refine_min_coverage: 0.6,
            enhance: EnhanceMode::Natural,
            auto_capture: true,
        }
    }
}

impl SessionConfig {
    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_interval_ms)
    }

    pub fn tracking_interval(&self) -> Duration {
        Duration::from_millis(self.tracking_interval_ms)
    }
}

/// Encoding of the final scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub jpeg_quality: u8,
    pub file_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 95,
            file_name: "scanned_doc.jpg".into(),
        }
    }
}

/// Complete scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub live: QualityThresholds,
    pub still: QualityThresholds,
    pub tracker: TrackerConfig,
    pub session: SessionConfig,
    pub output: OutputConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            live: QualityThresholds::live(),
            still: QualityThresholds::still(),
            tracker: TrackerConfig::default(),
            session: SessionConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        info!(path = %path.display(), "scanner config loaded");
        Ok(config)
    }

    /// Persist as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        debug!(path = %path.as_ref().display(), "scanner config saved");
        Ok(())
    }

    /// Reject values that would break the pipeline.
    pub fn validate(&self) -> Result<()> {
        self.live.validate("live")?;
        self.still.validate("still")?;
        if !(self.tracker.smoothing > 0.0 && self.tracker.smoothing <= 1.0) {
            return Err(ScanError::Config(
                "tracker.smoothing must be in (0, 1]".into(),
            ));
        }
        if self.tracker.steady_threshold == 0 {
            return Err(ScanError::Config(
                "tracker.steady_threshold must be at least 1".into(),
            ));
        }
        if self.session.analysis_interval_ms == 0 || self.session.tracking_interval_ms == 0 {
            return Err(ScanError::Config("loop intervals must be non-zero".into()));
        }
        if self.output.jpeg_quality == 0 || self.output.jpeg_quality > 100 {
            return Err(ScanError::Config("output.jpeg_quality must be 1-100".into()));
        }
        Ok(())
    }
}
