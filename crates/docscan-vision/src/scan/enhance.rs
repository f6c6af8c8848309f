// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement pipeline — auto-levels, sharpening, contrast boosting and
// adaptive binarization of a perspective-corrected page.

use docscan_core::EnhanceMode;
use docscan_core::error::{Result, ScanError};
use image::{DynamicImage, GrayImage, Luma};
use tracing::{debug, info, instrument};

use crate::image::ops::{IntegralImage, LumaHistogram};
use crate::image::processor::ImageProcessor;

/// Percentiles clipped by auto-levels.
const LEVELS_LOW: f64 = 0.01;
const LEVELS_HIGH: f64 = 0.99;

/// Enhances a corrected document image for readability.
///
/// Each step consumes `self` and returns the transformed enhancer, so the
/// pipeline for a mode reads as a chain.
pub struct ScanEnhancer {
    /// The working image (kept as `DynamicImage` for flexibility).
    image: DynamicImage,
}

impl ScanEnhancer {
    // -- Construction ---------------------------------------------------------

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Pipeline -------------------------------------------------------------

    /// Run the pipeline for `mode`.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn enhance(self, mode: EnhanceMode) -> Result<Self> {
        if self.image.width() == 0 || self.image.height() == 0 {
            return Err(ScanError::Enhancement("image is empty".into()));
        }
        info!(?mode, "Running scan enhancement");

        let enhanced = match mode {
            EnhanceMode::Natural => self.auto_levels(LEVELS_LOW, LEVELS_HIGH).sharpen(1.0, 4),
            EnhanceMode::HighContrast => self
                .auto_levels(LEVELS_LOW, LEVELS_HIGH)
                .boost_contrast(1.3)
                .sharpen(1.0, 4),
            EnhanceMode::Binarized => self.auto_levels(LEVELS_LOW, LEVELS_HIGH).binarize(15, 10),
        };
        Ok(enhanced)
    }

    /// Stretch luminance so the `low`/`high` percentiles map to black and
    /// white. Colour channels are stretched with the same mapping.
    #[instrument(skip(self))]
    pub fn auto_levels(self, low: f64, high: f64) -> Self {
        let histogram = LumaHistogram::from_luma(&self.image.to_luma8());
        let black = histogram.percentile(low) as f32;
        let white = histogram.percentile(high) as f32;
        if white - black < 2.0 {
            debug!(black, white, "Flat histogram; levels unchanged");
            return self;
        }

        let scale = 255.0 / (white - black);
        let mut rgb = self.image.to_rgb8();
        for pixel in rgb.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = ((*channel as f32 - black) * scale).clamp(0.0, 255.0) as u8;
            }
        }
        debug!(black, white, "Levels stretched");
        Self {
            image: DynamicImage::ImageRgb8(rgb),
        }
    }

    /// Unsharp mask.
    pub fn sharpen(self, sigma: f32, threshold: i32) -> Self {
        Self {
            image: self.image.unsharpen(sigma, threshold),
        }
    }

    pub fn boost_contrast(self, factor: f32) -> Self {
        Self {
            image: ImageProcessor::from_dynamic(self.image)
                .adjust_contrast(factor)
                .into_dynamic(),
        }
    }

    // -- Binarization ---------------------------------------------------------

    /// Apply adaptive thresholding to produce a black-and-white image.
    ///
    /// Uses a local mean approach: for each pixel, the threshold is the mean
    /// intensity within a `block_radius` neighbourhood, minus a constant `c`.
    /// Pixels darker than the local threshold become black; others become white.
    ///
    /// A typical `block_radius` is 15 and `c` is 10.
    #[instrument(skip(self))]
    pub fn binarize(self, block_radius: u32, c: i32) -> Self {
        let gray = self.image.to_luma8();
        let (width, height) = gray.dimensions();
        let integral = IntegralImage::new(&gray);

        let output = GrayImage::from_fn(width, height, |x, y| {
            let local_mean = integral.local_mean(x, y, block_radius);
            let threshold = (local_mean as i32 - c).clamp(0, 255) as u8;
            if gray.get_pixel(x, y).0[0] < threshold {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });

        debug!("Binarization complete");
        Self {
            image: DynamicImage::ImageLuma8(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faint_page() -> DynamicImage {
        // Grey paper (150) with faint pencil strokes (120).
        DynamicImage::ImageLuma8(GrayImage::from_fn(120, 80, |x, y| {
            if (x / 10) % 3 == 0 && y > 20 && y < 60 {
                Luma([120])
            } else {
                Luma([150])
            }
        }))
    }

    #[test]
    fn auto_levels_stretches_to_full_range() {
        let out = ScanEnhancer::from_dynamic(faint_page())
            .auto_levels(LEVELS_LOW, LEVELS_HIGH)
            .into_dynamic()
            .to_luma8();
        let min = out.pixels().map(|p| p.0[0]).min().unwrap_or(0);
        let max = out.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn flat_image_is_left_alone() {
        let flat = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([90])));
        let out = ScanEnhancer::from_dynamic(flat).auto_levels(0.01, 0.99).into_dynamic();
        assert_eq!(out.to_luma8().get_pixel(5, 5).0[0], 90);
    }

    #[test]
    fn binarized_mode_is_black_and_white() {
        let out = ScanEnhancer::from_dynamic(faint_page())
            .enhance(EnhanceMode::Binarized)
            .expect("enhance")
            .into_dynamic()
            .to_luma8();
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.get_pixel(5, 40).0[0], 0, "stroke should be black");
        assert_eq!(out.get_pixel(15, 40).0[0], 255, "paper should be white");
    }

    #[test]
    fn every_mode_keeps_dimensions() {
        for mode in [EnhanceMode::Natural, EnhanceMode::HighContrast, EnhanceMode::Binarized] {
            let out = ScanEnhancer::from_dynamic(faint_page()).enhance(mode).expect("enhance");
            assert_eq!((out.as_dynamic().width(), out.as_dynamic().height()), (120, 80));
        }
    }

    #[test]
    fn empty_image_is_an_error() {
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let result = ScanEnhancer::from_dynamic(empty).enhance(EnhanceMode::Natural);
        assert!(matches!(result, Err(ScanError::Enhancement(_))));
    }
}
